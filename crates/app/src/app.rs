use std::marker::PhantomData;
use std::path::PathBuf;
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, filter::filter_fn, fmt, layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Host-side logging context.
///
/// Keeps the non-blocking file writer alive; dropping it flushes and stops
/// the file layer.
pub struct AppContext {
    pub app_id: &'static str,
    pub version: &'static str,
    log_file: Option<PathBuf>,
    _log_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

impl AppContext {
    pub fn app_id(&self) -> &str {
        self.app_id
    }

    pub fn version(&self) -> &'static str {
        self.version
    }

    /// Where the file layer writes, if one was configured.
    pub fn log_file(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }
}

/// Application metadata trait.
///
/// Hosts embedding a form engine name themselves through this; the id also
/// names the log file.
pub trait Application: Sized + 'static {
    const APP_ID: &'static str;
}

/// Builder for the logging bootstrap.
pub struct AppBuilder<A: Application> {
    version: &'static str,
    log_dir: Option<PathBuf>,
    level: LevelFilter,
    _marker: PhantomData<A>,
}

impl<A: Application> AppBuilder<A> {
    pub fn new(version: &'static str) -> Self {
        #[cfg(debug_assertions)]
        let level = LevelFilter::DEBUG;

        #[cfg(not(debug_assertions))]
        let level = LevelFilter::WARN;

        Self {
            version,
            log_dir: None,
            level,
            _marker: PhantomData,
        }
    }

    /// Also write logs to `<dir>/<APP_ID>.log` through a non-blocking writer.
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    /// Installs the global subscriber: console always, file when configured.
    /// `RUST_LOG` overrides the level when present.
    ///
    /// Fails if a global subscriber is already set.
    pub fn build(self) -> Result<AppContext, BoxError> {
        // RUST_LOG, when set, takes over from the configured level.
        let env_filter = EnvFilter::try_from_default_env().ok();
        let level = match env_filter {
            Some(_) => LevelFilter::TRACE,
            None => self.level,
        };

        let console_layer = fmt::Layer::default()
            .with_target(false)
            .with_filter(filter_fn(move |metadata| metadata.level() <= &level));

        let (file_layer, guard, log_file) = match self.log_dir {
            Some(dir) => {
                std::fs::create_dir_all(&dir)?;
                let file_name = format!("{}.log", A::APP_ID);
                let file_appender = tracing_appender::rolling::never(&dir, &file_name);
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

                let layer = fmt::Layer::default()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(non_blocking)
                    .with_filter(filter_fn(move |metadata| metadata.level() <= &level));
                (Some(layer), Some(guard), Some(dir.join(file_name)))
            }
            None => (None, None, None),
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(console_layer)
            .try_init()?;

        Ok(AppContext {
            app_id: A::APP_ID,
            version: self.version,
            log_file,
            _log_guard: guard,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe;

    impl Application for Probe {
        const APP_ID: &'static str = "app-probe";
    }

    #[test]
    fn file_layer_is_named_after_the_app() {
        let dir = std::env::temp_dir().join("app-probe-logs");
        let ctx = AppBuilder::<Probe>::new("0.0.0")
            .with_log_dir(&dir)
            .build()
            .unwrap();
        assert_eq!(ctx.app_id(), "app-probe");
        assert_eq!(ctx.log_file(), Some(&dir.join("app-probe.log")));

        // The global subscriber can only be installed once.
        assert!(AppBuilder::<Probe>::new("0.0.0").build().is_err());
    }
}
