use crate::net::provider::{ProviderSession, SendError};
use rand::Rng;

pub const PROBE_LENGTH: usize = 200;
pub const PROBE_MARKER: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];

/// Random frame of `PROBE_LENGTH` bytes, starting with `PROBE_MARKER`.
pub fn build_probe() -> [u8; PROBE_LENGTH] {
    build_probe_with(&mut rand::rng())
}

pub fn build_probe_with<R: Rng>(rng: &mut R) -> [u8; PROBE_LENGTH] {
    let mut probe = [0u8; PROBE_LENGTH];
    rng.fill(&mut probe[..]);
    probe[..PROBE_MARKER.len()].copy_from_slice(&PROBE_MARKER);

    probe
}

/// Sends one probe through the opened device.
pub fn inject<S: ProviderSession + ?Sized>(session: &mut S) -> Result<(), SendError> {
    let probe = build_probe();
    session.send(&probe)?;
    log::info!("Probe of {} bytes sent.", probe.len());

    Ok(())
}
