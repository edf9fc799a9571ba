// Encoding shorthand parser module

pub mod ast;
pub mod encoding;
pub mod lexer;

use anyhow::{anyhow, bail, Result};
use log::warn;

use crate::encoding::{Binning, Channel, EncodingMap, EncodingSpec};
use crate::field::FieldRegistry;

// Public API re-exports
pub use ast::Binding;
pub use encoding::{parse_binding, parse_encoding};

/// Parse shorthand text into bindings, turning nom errors into readable ones.
pub fn parse_encoding_str(input: &str) -> Result<Vec<Binding>> {
    match parse_encoding(input) {
        Ok((_, bindings)) => Ok(bindings),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let at = e.input.trim();
            if at.is_empty() {
                Err(anyhow!("Unexpected end of encoding"))
            } else {
                Err(anyhow!("Invalid encoding near '{}'", at))
            }
        }
        Err(nom::Err::Incomplete(_)) => Err(anyhow!("Incomplete encoding")),
    }
}

/// Turn parsed bindings into an encoding map keyed by channel.
///
/// Field names are matched against the registry by display name first, then
/// by full identifier; anything else is passed through so the compiler can
/// report it as a missing field.
pub fn build_encoding(bindings: &[Binding], registry: &FieldRegistry) -> Result<EncodingMap> {
    let mut map = EncodingMap::new();

    for binding in bindings {
        let channel: Channel = binding.channel.parse().map_err(|e: String| anyhow!(e))?;
        if map.contains_key(&channel) {
            bail!("Channel '{}' is bound more than once", channel);
        }

        let field_id = registry
            .find_by_name(&binding.field)
            .map(|f| f.id.to_string())
            .unwrap_or_else(|| binding.field.clone());

        let mut spec = EncodingSpec::field(&field_id);
        if binding.is_bin() {
            spec.binning = Some(match binding.maxbins {
                Some(maxbins) => Binning::MaxBins { maxbins },
                None => Binning::Flag(true),
            });
        } else if let Some(op) = &binding.operator {
            if binding.maxbins.is_some() {
                warn!("ignoring bin count on '{}({})'", op, binding.field);
            }
            spec.aggregate = Some(op.clone());
        }
        spec.sort_order = binding.sort;
        spec.custom_domain = binding.domain.clone();

        map.insert(channel, spec);
    }

    Ok(map)
}
