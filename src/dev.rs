//! Runs the API server and the front-end dev server side by side.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use sysinfo::{Pid, Signal, System};
use tokio::process::{Child, Command};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Arguments of the `dev` subcommand.
#[derive(Args, Debug, Clone)]
pub struct DevArgs {
    /// Directory of the front-end project (runs `npm start` there)
    #[arg(long, default_value = "frontend")]
    pub frontend_dir: PathBuf,
}

pub async fn run(args: DevArgs) -> anyhow::Result<()> {
    let myself = std::env::current_exe()?;

    println!("Starting backend server...");
    let mut backend = Command::new(&myself).arg("serve").spawn()?;

    println!("Starting frontend development server...");
    let mut frontend = match Command::new("npm").arg("start").current_dir(&args.frontend_dir).spawn() {
        Ok(child) => child,
        Err(e) => {
            println!("Error starting development servers: {}", e);
            terminate(&mut backend, "backend").await;
            return Ok(());
        }
    };

    println!("\nDevelopment servers started successfully!");
    println!("Backend API: http://localhost:{}", crate::config::DEFAULT_PORT);
    println!("Frontend: http://localhost:3000");
    println!("Press Ctrl+C to stop both servers.\n");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = backend.wait() => println!("Backend process terminated unexpectedly"),
        _ = frontend.wait() => println!("Frontend process terminated unexpectedly"),
    }

    println!("\nShutting down development servers...");
    terminate(&mut backend, "backend").await;
    terminate(&mut frontend, "frontend").await;
    Ok(())
}

/// Asks the child to stop, killing it if it is still alive after the grace period.
async fn terminate(child: &mut Child, name: &str) {
    if let Ok(Some(_)) = child.try_wait() {
        return;
    }

    let signalled = child.id().is_some_and(send_term);
    if signalled {
        if tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await.is_ok() {
            return;
        }
        tracing::warn!("The {} process ignored SIGTERM, killing it", name);
    }
    if let Err(e) = child.kill().await {
        println!("Error terminating process: {}", e);
    }
}

fn send_term(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut sys = System::new();
    if !sys.refresh_process(pid) {
        return false;
    }
    sys.process(pid)
        .and_then(|process| process.kill_with(Signal::Term))
        .unwrap_or(false)
}
