//! Runner that turns parsed arguments into a push

use crate::cli::args::{Args, Command, PushArgs};
use crate::config::PushConfig;
use crate::engine::{ArchiveFileSource, DockerEngine, ImageSource};
use crate::error::Result;
use crate::logging::Logger;
use crate::pipeline::PushDriver;
use crate::registry::HttpConnector;
use std::sync::Arc;

pub struct Runner {
    args: Args,
    logger: Logger,
}

impl Runner {
    pub fn new(args: Args) -> Self {
        let logger = if args.quiet {
            Logger::new_quiet()
        } else {
            Logger::new(args.verbose)
        };

        Self { args, logger }
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Run the selected command; returns the digest to print
    pub async fn run(&self) -> Result<String> {
        match &self.args.command {
            Command::Push(push) => self.push(push).await,
        }
    }

    async fn push(&self, push: &PushArgs) -> Result<String> {
        let config = self.resolve_config(push)?;
        self.logger.verbose(&format!(
            "Deadline {}s, {} concurrent upload(s)",
            config.timeout_secs, config.concurrency
        ));

        if config.auth.has_credentials() {
            self.logger.verbose(&format!(
                "Authenticating as {}",
                config.auth.username.as_deref().unwrap_or_default()
            ));
        }

        let source: Arc<dyn ImageSource> = match &push.input {
            Some(path) => Arc::new(ArchiveFileSource::new(path)),
            None => Arc::new(DockerEngine::connect(&config.engine)?),
        };
        let connector = Arc::new(HttpConnector::new(&config, self.logger.clone())?);

        let mut driver = PushDriver::new(source, connector, config, self.logger.clone());
        let result = driver.push_direct(&push.image, &push.registry).await?;

        Ok(result.digest().unwrap_or_default().to_string())
    }

    /// Defaults, then the config file, then the environment, then flags
    fn resolve_config(&self, push: &PushArgs) -> Result<PushConfig> {
        let base = match &self.args.config {
            Some(path) => PushConfig::from_file(path)?,
            None => PushConfig::default(),
        };
        let config = apply_flags(base.with_env()?, push);
        config.validate()?;
        Ok(config)
    }
}

fn apply_flags(mut config: PushConfig, push: &PushArgs) -> PushConfig {
    if let Some(timeout) = push.timeout {
        config.timeout_secs = timeout;
    }
    if let Some(concurrency) = push.concurrency {
        config.concurrency = concurrency;
    }
    if push.username.is_some() {
        config.auth.username = push.username.clone();
    }
    if push.password.is_some() {
        config.auth.password = push.password.clone();
    }
    if push.skip_tls {
        config.skip_tls = true;
    }
    if push.verify_layers {
        config.verify_layers = true;
    }
    if let Some(host) = &push.docker_host {
        config.engine.host = Some(host.clone());
    }
    if let Some(version) = &push.api_version {
        config.engine.api_version = version.clone();
    }
    config
}
