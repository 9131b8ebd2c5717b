//! Receiver - listen on a named pipe and print what arrives.
//!
//! This demo shows:
//! - Listening in either mode
//! - Accepting a STREAM peer (MESSAGE listeners accept implicitly)
//! - Looping on `recv`: a STREAM listener stops when its peer leaves, a
//!   MESSAGE listener keeps serving new peers until interrupted
//!
//! # Running
//!
//! ```sh
//! RUST_LOG=protopipe=debug cargo run --example pipe_recv -- MESSAGE chan1
//! # in another terminal
//! cargo run --example pipe_send -- MESSAGE chan1 hello
//! ```

use std::env;

use protopipe::{Pipe, PipeMode};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let mut args = env::args().skip(1);
    let (Some(mode), Some(name)) = (args.next(), args.next()) else {
        eprintln!("usage: pipe_recv <MESSAGE|STREAM> <name>");
        std::process::exit(2);
    };
    let mode: PipeMode = mode.parse()?;

    let pipe = Pipe::new(mode)?;
    pipe.listen(&name)?;
    println!("listening on {}", pipe.address().map(|a| a.to_string()).unwrap_or_default());

    if mode == PipeMode::Stream {
        pipe.accept()?;
    }

    while let Some(data) = pipe.recv(1024)? {
        println!("{} bytes: {}", data.len(), String::from_utf8_lossy(&data));
    }

    println!("peer closed");
    Ok(())
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("protopipe=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
