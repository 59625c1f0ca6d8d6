use color_eyre::eyre::{Result, WrapErr};
use reqecho::EchoServerTrait;
use reqecho::http::{HttpConfig, HttpEchoServer};
use reqecho::store::StorageStrategy;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn usage(program: &str) -> ! {
    eprintln!("Usage: {program} [port] [options]");
    eprintln!("  port:                     Port to bind to on 127.0.0.1 (default: 8080)");
    eprintln!("  --max-field N             Longest method, URI, header name or value in bytes");
    eprintln!("  --max-body N              Largest accepted request body in bytes");
    eprintln!("  --growth N                Body buffer growth increment in bytes");
    eprintln!("  --spill N                 Move bodies larger than N bytes to a temporary file");
    eprintln!("  --keep-open-after-error   Keep the connection open after a 400 response");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {program}                              # Echo on port 8080 with default limits");
    eprintln!("  {program} 9000 --max-body 1048576      # Echo on port 9000, 1 MiB body limit");
    eprintln!("  {program} 9000 --spill 65536           # Spill bodies over 64 KiB to disk");
    std::process::exit(1);
}

fn parse_size(program: &str, flag: &str, value: Option<String>) -> usize {
    match value.as_deref().map(str::parse::<usize>) {
        Some(Ok(n)) => n,
        _ => {
            eprintln!("{flag} expects a size in bytes");
            usage(program)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("reqecho=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Parse command line arguments
    let mut args = std::env::args();
    let program = args.next().unwrap_or_else(|| "reqecho".to_string());

    let mut builder = HttpConfig::builder().max_connections(1000);
    let mut port: u16 = 8080;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--max-field" => builder = builder.max_field_length(parse_size(&program, &arg, args.next())),
            "--max-body" => builder = builder.max_body_length(parse_size(&program, &arg, args.next())),
            "--growth" => builder = builder.growth_increment(parse_size(&program, &arg, args.next())),
            "--spill" => {
                let threshold = parse_size(&program, &arg, args.next());
                builder = builder.storage(StorageStrategy::Spill { threshold });
            }
            "--keep-open-after-error" => builder = builder.close_after_error(false),
            other => match other.parse::<u16>() {
                Ok(p) => port = p,
                Err(_) => usage(&program),
            },
        }
    }

    let config = builder
        .bind_addr(SocketAddr::from(([127, 0, 0, 1], port)))
        .build()
        .wrap_err("Invalid server configuration")?;

    info!(
        address = %config.bind_addr,
        max_connections = config.max_connections,
        max_field_length = config.accumulator.max_field_length,
        max_body_length = config.accumulator.max_body_length,
        storage = ?config.accumulator.storage,
        "Starting HTTP echo server"
    );

    let server = HttpEchoServer::new(config);
    server.run().await.wrap_err("Failed to run HTTP echo server")?;

    Ok(())
}
