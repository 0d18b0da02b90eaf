//! `tether send` - Send one request to a running bridge.

use tether_engine::Client;

use crate::output::StyledOutput;

pub fn execute(addr: &str, request: &str, out: &mut StyledOutput) -> anyhow::Result<bool> {
    let mut client = Client::connect(addr)?;
    let reply = client.send(request)?;
    Ok(out.reply(&reply))
}
