//! Generate hex-encoded 32-byte keys for STRONGBOX_TOKEN_KEY and
//! STRONGBOX_DEV_KEK.
//!
//! Usage:
//!   cargo run --bin strongbox-keygen
//!   cargo run --bin strongbox-keygen -- 2   # generate two keys

fn main() {
    let count: usize = std::env::args()
        .nth(1)
        .map(|arg| match arg.parse() {
            Ok(n) if n >= 1 => n,
            _ => {
                eprintln!("Usage: strongbox-keygen [count]");
                std::process::exit(1);
            }
        })
        .unwrap_or(1);

    for _ in 0..count {
        let mut buf = [0u8; 32];
        getrandom::getrandom(&mut buf).expect("failed to generate random bytes");
        println!("{}", hex::encode(buf));
    }
}
