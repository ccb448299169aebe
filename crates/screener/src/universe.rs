//! Ticker universe: the built-in Borsa Istanbul list, or one supplied by the operator

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};

/// BIST large caps scanned when no universe is given
pub const BIST_UNIVERSE: &[&str] = &[
    "THYAO.IS", "ASELS.IS", "GARAN.IS", "AKBNK.IS", "EREGL.IS", "TUPRS.IS",
    "SASA.IS", "KCHOL.IS", "SAHOL.IS", "BIMAS.IS", "MGROS.IS", "FROTO.IS",
    "TOASO.IS", "TCELL.IS", "TTKOM.IS", "HEKTS.IS", "ALARK.IS", "DOHOL.IS",
    "ISCTR.IS", "YKBNK.IS", "HALKB.IS", "VAKBN.IS", "KOZAL.IS", "GLYHO.IS",
    "ENKAI.IS", "AKSA.IS", "PETKM.IS", "TTRAK.IS", "MAVI.IS", "AEFES.IS",
    "SOKM.IS", "CCOLA.IS", "ANSGR.IS", "PGSUS.IS", "ULKER.IS", "KORDS.IS",
    "TAVHL.IS", "OYAKC.IS", "ISGYO.IS", "AKFGY.IS", "EKGYO.IS", "VESBE.IS",
    "BRISA.IS", "FLO.IS", "DEVA.IS", "CELHA.IS", "MONTI.IS", "SMART.IS",
];

pub fn default_universe() -> Vec<String> {
    normalize_universe(BIST_UNIVERSE.iter().copied())
}

/// Trim, upper-case, drop blanks and repeated tickers. First occurrence keeps its place.
pub fn normalize_universe<I, S>(tickers: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    tickers
        .into_iter()
        .map(|t| t.as_ref().trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Parse a universe file: either a JSON array of strings, or plain text with
/// tickers separated by commas/whitespace and `#` comments.
pub fn parse_universe(content: &str) -> Result<Vec<String>> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        let tickers: Vec<String> =
            serde_json::from_str(trimmed).context("universe JSON must be an array of strings")?;
        return Ok(normalize_universe(tickers));
    }

    let tokens = content
        .lines()
        .map(|line| line.split('#').next().unwrap_or(""))
        .flat_map(|line| line.split(|c: char| c == ',' || c.is_whitespace()));
    Ok(normalize_universe(tokens))
}

pub fn load_universe_file(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading universe file {}", path.display()))?;
    let universe = parse_universe(&content)?;
    if universe.is_empty() {
        anyhow::bail!("universe file {} lists no tickers", path.display());
    }
    Ok(universe)
}
