//! Sender - connect to a named pipe and send one payload.
//!
//! Pair with `pipe_recv`. Without a message argument, stdin lines are sent
//! one by one.
//!
//! ```sh
//! cargo run --example pipe_send -- STREAM chan2 "abc"
//! ```

use std::env;
use std::io::BufRead;

use protopipe::{Pipe, PipeMode};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("protopipe=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = env::args().skip(1);
    let (Some(mode), Some(name)) = (args.next(), args.next()) else {
        eprintln!("usage: pipe_send <MESSAGE|STREAM> <name> [message]");
        std::process::exit(2);
    };
    let mode: PipeMode = mode.parse()?;

    let pipe = Pipe::new(mode)?;
    pipe.connect(&name)?;

    match args.next() {
        Some(message) => pipe.send(message.as_bytes())?,
        None => {
            for line in std::io::stdin().lock().lines() {
                pipe.send(line?.as_bytes())?;
            }
        }
    }

    pipe.close();
    Ok(())
}
