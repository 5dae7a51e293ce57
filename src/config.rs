use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Args;

pub const DEFAULT_PORT: u16 = 5000;

/// Arguments of the `serve` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Interface to bind (overridden by HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overridden by PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory holding the built front-end
    #[arg(long, default_value = "frontend/build")]
    pub static_dir: PathBuf,

    /// Maximum number of download jobs running at once
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_jobs: u32,
}

/// Resolved settings of the HTTP service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
    pub max_jobs: usize,
    /// Working directory of spawned download jobs.
    pub work_dir: PathBuf,
}

impl ServerConfig {
    /// Combines flags with the HOST/PORT environment overrides.
    pub fn load(args: &ServeArgs) -> Result<Self> {
        Self::resolve(args, env::var("HOST").ok(), env::var("PORT").ok(), env::current_dir()?)
    }

    /// Environment values, when present, win over flags.
    fn resolve(
        args: &ServeArgs,
        env_host: Option<String>,
        env_port: Option<String>,
        work_dir: PathBuf,
    ) -> Result<Self> {
        let host = env_host
            .or_else(|| args.host.clone())
            .unwrap_or_else(|| "127.0.0.1".to_string());
        let port = match env_port {
            Some(p) => p
                .parse()
                .map_err(|e| anyhow!("Invalid PORT value '{}': {}", p, e))?,
            None => args.port.unwrap_or(DEFAULT_PORT),
        };

        Ok(ServerConfig {
            host,
            port,
            static_dir: args.static_dir.clone(),
            max_jobs: args.max_jobs as usize,
            work_dir,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
