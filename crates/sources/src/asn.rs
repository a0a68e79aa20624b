use sibas_recon::Asn;

/// Map a raw integer onto the ASN space. Zero is reserved and rejected.
pub fn normalize(raw: u64) -> Option<Asn> {
    match Asn::try_from(raw) {
        Ok(0) | Err(_) => None,
        Ok(asn) => Some(asn),
    }
}

/// Parse `64512`, `AS64512` or `as64512`.
pub fn parse(text: &str) -> Option<Asn> {
    let text = text.trim();
    let digits = text
        .strip_prefix("AS")
        .or_else(|| text.strip_prefix("as"))
        .unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u64>().ok().and_then(normalize)
}
