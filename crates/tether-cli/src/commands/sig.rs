//! `tether sig` - Print signature tokens for type names.

use tether_engine::signature::{class_to_signature_token, full_signature, parameter_list_to_signature};
use tether_engine::DescriptorError;

use crate::output::StyledOutput;

/// One `name  token` line per type, then the parameter list or full signature.
fn render(types: &[String], returns: Option<&str>) -> Result<Vec<String>, DescriptorError> {
    let mut lines = Vec::with_capacity(types.len() + 1);
    for ty in types {
        lines.push(format!("{}  {}", ty, class_to_signature_token(ty)?));
    }
    let signature = match returns {
        Some(returns) => full_signature(types, returns)?,
        None => parameter_list_to_signature(types)?,
    };
    lines.push(signature);
    Ok(lines)
}

pub fn execute(types: &[String], returns: Option<&str>, out: &mut StyledOutput) -> anyhow::Result<()> {
    let mut lines = render(types, returns)?;
    let signature = lines.pop().unwrap_or_default();
    for line in lines {
        out.value(&line);
    }
    out.success(&signature);
    Ok(())
}
