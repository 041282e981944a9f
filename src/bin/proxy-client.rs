use clap::{Parser, Subcommand};
use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "proxy-client")]
#[command(about = "Test client for the TCP to HTTPS proxy", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one payload over TCP and print the reply
    Send {
        host: String,
        port: u16,
        #[arg(default_value = "Hello from TCP test client!")]
        message: String,
    },
    /// Print the proxy's JSON metrics
    Metrics {
        #[arg(short, long, default_value = "http://localhost:9090")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Send { host, port, message } => send(&host, port, &message).await?,
        Commands::Metrics { url } => {
            let res = reqwest::Client::new()
                .get(format!("{}/metrics", url.trim_end_matches('/')))
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn send(host: &str, port: u16, message: &str) -> Result<(), Box<dyn std::error::Error>> {
    let address = format!("{}:{}", host, port);
    println!("Connecting to TCP proxy at {}...", address);

    let mut stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(&address))
        .await
        .map_err(|_| format!("timed out connecting to {}", address))??;
    println!("Connected");

    println!("Sending message: {}", message);
    stream.write_all(message.as_bytes()).await?;

    let mut buffer = vec![0u8; 4096];
    let n = timeout(READ_TIMEOUT, stream.read(&mut buffer))
        .await
        .map_err(|_| "timed out waiting for response")??;

    println!("Received response ({} bytes):", n);
    println!("{}", String::from_utf8_lossy(&buffer[..n]));
    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: metrics endpoint returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Err(format!("status {}", status).into());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
