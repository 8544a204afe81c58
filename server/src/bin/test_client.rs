//! Line client for manual testing.
//!
//! Sends every stdin line as a request and prints every response line. Lines
//! typed without braces are wrapped as a single `command` request, so
//! `moduleman -o show -a id` works as well as raw JSON.

use clap::Parser;
use shared::{Request, Response, LINE_TERMINATOR};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port
    #[clap(short, long, default_value = "8000")]
    port: u16,
    /// Hide world snapshots
    #[clap(short, long)]
    quiet: bool,
}

/// Turns a typed line into a request line.
fn request_line(input: &str) -> Result<String, Box<dyn std::error::Error>> {
    let input = input.trim();
    if input.starts_with('{') {
        // Validate before sending so typos are caught locally
        Request::from_line(input)?;
        return Ok(input.to_string());
    }
    let request = Request {
        command: vec![input.to_string()],
        ..Default::default()
    };
    Ok(request.to_line()?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let stream = TcpStream::connect((args.host.as_str(), args.port)).await?;
    println!("Connected to {}", stream.peer_addr()?);
    let (reader, mut writer) = stream.into_split();

    let quiet = args.quiet;
    let printer = tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match Response::from_line(&line) {
                Ok(response) if quiet && response.update.is_some() => {
                    if !response.error.is_empty() {
                        println!("errors: {:?}", response.error);
                    }
                }
                Ok(_) => println!("{}", line),
                Err(e) => println!("Undecodable response: {}: {}", e, line),
            }
        }
        println!("Connection closed");
    });

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = input.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match request_line(&line) {
            Ok(mut request) => {
                request.push_str(LINE_TERMINATOR);
                writer.write_all(request.as_bytes()).await?;
            }
            Err(e) => println!("Invalid request: {}", e),
        }
    }
    writer.shutdown().await?;
    printer.await?;
    Ok(())
}
