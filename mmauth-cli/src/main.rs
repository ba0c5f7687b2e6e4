use std::sync::Arc;

use clap::{Parser, Subcommand};
use mmauth::{
    BuildChannel, HttpTokenExchanger, SessionCredential, SsoConfig, SsoDelegate, SsoFlow,
    SystemOpener, UrlEventBus,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Notify;

#[derive(Parser)]
#[command(name = "mmauth", version, about = "SSO browser login flow driver")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a browser SSO login and print the resulting session tokens
    Login {
        /// Server base URL used for the challenge token exchange
        #[arg(long)]
        server: String,

        /// Provider authorization endpoint
        #[arg(long)]
        login_url: String,

        /// Use the pre-release URL scheme for the redirect
        #[arg(long)]
        beta: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mmauth=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Login {
            server,
            login_url,
            beta,
        } => run_login(&server, &login_url, beta).await,
    }
}

/// Terminal host for the flow: prints outcomes and wakes the main loop once
/// the flow reaches a terminal state.
struct TerminalDelegate {
    finished: Notify,
}

impl SsoDelegate for TerminalDelegate {
    fn on_login(&self, credential: SessionCredential) {
        println!("login successful");
        println!("bearer token: {}", credential.bearer_token);
        println!("csrf token:   {}", credential.csrf_token);
        self.finished.notify_one();
    }

    fn on_error(&self, message: String) {
        eprintln!("login failed: {message}");
        self.finished.notify_one();
    }
}

async fn run_login(server: &str, login_url: &str, beta: bool) -> anyhow::Result<()> {
    let channel = if beta {
        BuildChannel::Beta
    } else {
        BuildChannel::Release
    };

    let bus = UrlEventBus::new();
    let delegate = Arc::new(TerminalDelegate {
        finished: Notify::new(),
    });

    let flow = SsoFlow::mount(
        SsoConfig::new(login_url, channel),
        Arc::new(bus.clone()),
        Arc::new(SystemOpener),
        Arc::new(HttpTokenExchanger::new(server)),
        delegate.clone(),
    );

    println!("Opening the provider login page in your browser...");
    println!(
        "If this machine is not registered for {} links, paste the full redirect URL here:",
        channel.redirect_prefix()
    );

    // Feed pasted redirect URLs into the same event source the OS would use.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = delegate.finished.notified() => break,
            line = lines.next_line() => {
                match line? {
                    Some(line) if !line.trim().is_empty() => bus.publish(line.trim().to_string()),
                    Some(_) => {}
                    None => break,
                }
            }
        }
    }

    if let Some(error) = flow.error_text() {
        anyhow::bail!(error);
    }
    Ok(())
}
