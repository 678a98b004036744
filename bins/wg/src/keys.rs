//! Key generation commands for WireGuard.

use std::io::{self, Read};

use rand::RngCore;
use wgctl::wg::Key;
use wgctl::{Error, Result};
use x25519_dalek::{PublicKey, StaticSecret};

/// Generate a new private key.
pub fn genkey() -> Result<()> {
    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);

    // Clamp for Curve25519 (this is what WireGuard expects)
    key[0] &= 248;
    key[31] &= 127;
    key[31] |= 64;

    println!("{}", Key::new(key));
    Ok(())
}

/// Derive public key from private key read from stdin.
pub fn pubkey() -> Result<()> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input).map_err(Error::Io)?;

    let private = Key::from_base64(&input)?;

    let secret = StaticSecret::from(*private.as_bytes());
    let public = PublicKey::from(&secret);

    println!("{}", Key::new(*public.as_bytes()));
    Ok(())
}

/// Generate a preshared key.
pub fn genpsk() -> Result<()> {
    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);

    println!("{}", Key::new(key));
    Ok(())
}
