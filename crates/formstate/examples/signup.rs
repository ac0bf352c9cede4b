//! Drives a signup form through edits, blur validation and two submissions
//! against an in-process transport. Console logging comes from the `app`
//! crate, at debug level in debug builds.

use std::time::Duration;

use app::{AppBuilder, Application};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use formstate::record::{FieldPath, Value};
use formstate::{
    ActionResult, FieldCheck, FormInit, FormOptions, RuleSchema, SubmitRequest, SuperForm,
    TaintOption, Transport, TransportError, Validation, Validators,
};

struct SignupDemo;

impl Application for SignupDemo {
    const APP_ID: &'static str = "formstate-signup";
}

/// Rejects the username "admin" as taken, accepts anything else.
struct SignupServer;

impl Transport for SignupServer {
    fn submit(
        &self,
        request: SubmitRequest,
        _cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<ActionResult, TransportError>> {
        async move {
            tokio::time::sleep(Duration::from_millis(700)).await;
            let taken = request.data.get("username").and_then(Value::as_str) == Some("admin");

            let mut form = Validation::empty_form(request.data);
            form.id = request.form_id;
            form.empty = false;
            form.valid = !taken;
            if taken {
                form.errors
                    .set_messages(&FieldPath::parse("username"), Some(vec!["already taken".into()]));
            } else {
                form.message = Some(json!("Welcome aboard"));
            }
            let status = if taken { 400 } else { 200 };
            ActionResult::with_form(status, &form).map_err(|e| TransportError::Failed(e.to_string()))
        }
        .boxed()
    }
}

fn not_empty(message: &'static str) -> FieldCheck {
    FieldCheck::new(move |v| match v.as_str() {
        Some(s) if !s.trim().is_empty() => None,
        _ => Some(vec![message.to_string()]),
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let _ctx = AppBuilder::<SignupDemo>::new(env!("CARGO_PKG_VERSION"))
        .build()
        .map_err(|e| anyhow::anyhow!("logging setup failed: {e}"))?;

    let schema = RuleSchema::new()
        .field("username", not_empty("choose a username"))
        .field("password", not_empty("choose a password"))
        .refine("confirm", |record| {
            (record.get("password") != record.get("confirm"))
                .then(|| vec!["passwords do not match".to_string()])
        });

    let options = FormOptions::from_ron("(id: Some(\"signup\"), delay_ms: 300)")?;
    let form = SuperForm::builder(FormInit::Data(Value::from(json!({
        "username": "",
        "password": "",
        "confirm": ""
    }))))
    .options(options)
    .validators(Validators::schema(schema))
    .build()?;

    form.delayed().subscribe(|on| {
        if *on {
            println!("  (still submitting...)");
        }
    });

    for (field, value) in [("username", "admin"), ("password", "hunter2"), ("confirm", "hunter")] {
        form.set_path(&FieldPath::parse(field), Value::from(value), TaintOption::Taint);
    }
    form.on_blur().await?;
    for error in form.all_errors() {
        println!("before submit: {} -> {}", error.path, error.message);
    }

    form.set_path(&FieldPath::parse("confirm"), Value::from("hunter2"), TaintOption::Taint);
    println!("first submit: {:?}", form.submit(&SignupServer).await?);
    for error in form.all_errors() {
        println!("server says: {} -> {}", error.path, error.message);
    }

    form.set_path(&FieldPath::parse("username"), Value::from("ada"), TaintOption::Taint);
    println!("second submit: {:?}", form.submit(&SignupServer).await?);
    println!("message: {:?}, tainted: {}", form.message().get(), form.is_tainted());
    Ok(())
}
