#![allow(clippy::multiple_crate_versions)]

//! registryd binary.
//!
//! Without a command it runs the daemon; the inspection commands talk to a
//! running daemon over its control socket.

fn main() {
    if let Err(err) = registryd_lib::cli::run() {
        eprintln!("registryd: {err}");
        std::process::exit(1);
    }
}
