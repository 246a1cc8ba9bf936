use std::sync::OnceLock;

use regex::Regex;

use crate::requests::models::REQUEST_ID_PREFIX;
use crate::xrpl::models::MemoEnvelope;

fn request_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"req_\d+").expect("request id pattern is valid"))
}

/// Decode hex memo data to text. Invalid UTF-8 is replaced, invalid hex is skipped.
pub fn decode_memo_data(hex_data: &str) -> Option<String> {
    let bytes = hex::decode(hex_data.trim()).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// First `req_<digits>` id mentioned in a decoded memo
pub fn extract_request_id(text: &str) -> Option<&str> {
    if !text.contains(REQUEST_ID_PREFIX) {
        return None;
    }
    request_id_pattern().find(text).map(|found| found.as_str())
}

/// Candidate request ids, one per memo, in memo order
pub fn candidate_request_ids(memos: &[MemoEnvelope]) -> Vec<String> {
    memos
        .iter()
        .filter_map(|envelope| envelope.memo.memo_data.as_deref())
        .filter_map(decode_memo_data)
        .filter_map(|text| extract_request_id(&text).map(str::to_string))
        .collect()
}
