//! Shared helpers for the `rp-*` command line tools.

use replay::codec::Type;
use replay::layout::MemoryLayout;
use replay::range::Range;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum ToolError {
    #[error("'{0}' is neither a layout preset nor a readable layout file")]
    UnknownLayout(String),

    #[error("'{0}' is not a range; expected BASE:SIZE")]
    BadRange(String),

    #[error("'{0}' is not a number")]
    BadNumber(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Resolves a layout argument: a preset name, or the path of a JSON file
/// describing a [`MemoryLayout`].
pub fn resolve_layout(arg: &str) -> Result<MemoryLayout, ToolError> {
    if let Some(layout) = MemoryLayout::preset(arg) {
        return Ok(layout);
    }
    let path = Path::new(arg);
    if !path.is_file() {
        return Err(ToolError::UnknownLayout(arg.to_owned()));
    }
    let text = std::fs::read_to_string(path)?;
    Ok(MemoryLayout::from_json(&text)?)
}

/// Parses decimal or `0x`-prefixed hex.
pub fn parse_number(s: &str) -> Result<u64, ToolError> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|_| ToolError::BadNumber(s.to_owned()))
}

/// Parses `BASE:SIZE`.
pub fn parse_range(s: &str) -> Result<Range, ToolError> {
    let (base, size) = s
        .split_once(':')
        .ok_or_else(|| ToolError::BadRange(s.to_owned()))?;
    let base = parse_number(base)?;
    let size = parse_number(size)?;
    if base.checked_add(size).is_none() {
        return Err(ToolError::BadRange(s.to_owned()));
    }
    Ok(Range::new(base, size))
}

/// Writes `bytes` as a hex dump, 16 bytes per line, labelled with addresses
/// starting at `base`.
pub fn hexdump<W: Write>(out: &mut W, base: u64, bytes: &[u8]) -> io::Result<()> {
    for (i, line) in bytes.chunks(16).enumerate() {
        write!(out, "{:016x} ", base + (i as u64) * 16)?;
        for b in line {
            write!(out, " {b:02x}")?;
        }
        for _ in line.len()..16 {
            write!(out, "   ")?;
        }
        write!(out, "  |")?;
        for &b in line {
            let c = if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            };
            write!(out, "{c}")?;
        }
        writeln!(out, "|")?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldReport {
    pub name: String,
    pub ty: String,
    pub offset: u64,
    pub size: u64,
}

/// Placement of a type under one memory layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutReport {
    pub ty: String,
    pub size: u64,
    pub alignment: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldReport>,
}

impl LayoutReport {
    pub fn new(ty: &Type, layout: &MemoryLayout) -> Self {
        let fields = match ty {
            Type::Struct(st) => {
                let placed = st.layout(layout);
                st.fields
                    .iter()
                    .zip(placed.offsets)
                    .map(|(field, offset)| FieldReport {
                        name: field.name.clone(),
                        ty: field.ty.to_string(),
                        offset,
                        size: field.ty.size_of(layout),
                    })
                    .collect()
            }
            _ => Vec::new(),
        };
        Self {
            ty: ty.to_string(),
            size: ty.size_of(layout),
            alignment: ty.align_of(layout),
            fields,
        }
    }
}

impl std::fmt::Display for LayoutReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} size={} align={}", self.ty, self.size, self.alignment)?;
        for field in &self.fields {
            writeln!(
                f,
                "  +{:<6} {:<16} {} ({} bytes)",
                field.offset, field.name, field.ty, field.size
            )?;
        }
        Ok(())
    }
}
