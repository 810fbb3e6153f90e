//! Wire codec for the three stratum dialects.
//!
//! Everything here is pure and stateless: frame builders for the outbound
//! request vocabulary, a tolerant parser for inbound frames, and the two
//! numeric conversions the dialects disagree on (difficulty → boundary and
//! extranonce → start-nonce).
//!
//! # Why not a JSON-RPC library?
//!
//! Stratum predates JSON-RPC 2.0 and every dialect takes its own liberties:
//! notifications carry `id: null` or no id at all, ETHPROXY rides a `worker`
//! sidecar field on requests, the hashrate report alone claims
//! `"jsonrpc": "2.0"`, and error payloads are positional arrays. A strict
//! library fights all of that; two small serde types fit it exactly.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::hash::{Hash256, Hash64};
use crate::stratum::error::{StratumError, StratumResult};
use crate::stratum::messages::Solution;
use crate::u256::U256;
use crate::uri::Dialect;

/// Fixed request id space. Responses are correlated by these ids, so each
/// purpose owns one slot.
pub const ID_SUBSCRIBE: u64 = 1;
pub const ID_EXTRANONCE_SUBSCRIBE: u64 = 2;
pub const ID_AUTHORIZE: u64 = 3;
pub const ID_SUBMIT: u64 = 4;
pub const ID_WORK_KICK: u64 = 5;
pub const ID_HASHRATE: u64 = 6;

/// Outbound request frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,

    /// ETHPROXY worker sidecar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<String>,

    /// Only the hashrate report carries this tag; it reuses the node RPC
    /// method, there being no stratum method for hashrate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,

    pub method: String,
    pub params: Vec<Value>,
}

impl Request {
    fn new(id: u64, method: &str, params: Vec<Value>) -> Self {
        Self {
            id,
            worker: None,
            jsonrpc: None,
            method: method.to_string(),
            params,
        }
    }
}

/// Inbound frame, deserialized loosely.
///
/// Responses, notifications, and server-initiated requests all land here;
/// the session tells them apart by which fields are populated.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFrame {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Value,
}

impl RawFrame {
    /// Numeric frame id, if one is present. String or null ids read as
    /// absent, matching the permissiveness of deployed servers.
    pub fn id(&self) -> Option<u64> {
        self.id.as_u64()
    }

    /// Human-readable message of an `error: [code, message, …]` payload.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_array()?.get(1)?.as_str()
    }
}

/// A frame is processed only when it is a complete JSON object on one line.
///
/// Anything else is a partial read or inter-frame garbage and is discarded
/// by the session.
pub fn frame_is_complete(line: &str) -> bool {
    let line = line.trim();
    line.starts_with('{') && line.ends_with('}')
}

/// Parse one line into a loose frame.
pub fn parse_frame(line: &str) -> StratumResult<RawFrame> {
    Ok(serde_json::from_str(line)?)
}

/// Serialize an outbound request to its wire line (no trailing newline).
pub fn encode(request: &Request) -> StratumResult<String> {
    Ok(serde_json::to_string(request)?)
}

/// Split `user.worker` at the first dot.
///
/// Without a dot the whole user name doubles as the worker — the frames
/// eth-proxy pools have always been sent for suffix-less users. A
/// non-empty `hint` overrides that fallback for hosts that configure the
/// worker name out of band.
pub fn split_worker<'a>(user: &'a str, hint: &'a str) -> (&'a str, &'a str) {
    match user.split_once('.') {
        Some((user, worker)) => (user, worker),
        None if hint.is_empty() => (user, user),
        None => (user, hint),
    }
}

/// Subscribe (or login, for ETHPROXY) — the id=1 opener for every dialect.
pub fn subscribe(
    dialect: Dialect,
    user: &str,
    worker_hint: &str,
    email: &str,
    agent: &str,
) -> Request {
    match dialect {
        Dialect::Stratum => Request::new(ID_SUBSCRIBE, "mining.subscribe", vec![]),
        Dialect::EthProxy => {
            let (user, worker) = split_worker(user, worker_hint);
            let params = if email.is_empty() {
                vec![json!(user)]
            } else {
                vec![json!(user), json!(email)]
            };
            let mut request = Request::new(ID_SUBSCRIBE, "eth_submitLogin", params);
            request.worker = Some(worker.to_string());
            request
        }
        Dialect::EthereumStratum => Request::new(
            ID_SUBSCRIBE,
            "mining.subscribe",
            vec![json!(agent), json!("EthereumStratum/1.0.0")],
        ),
    }
}

/// `mining.authorize` (id=3).
pub fn authorize(user: &str, pass: &str) -> Request {
    Request::new(ID_AUTHORIZE, "mining.authorize", vec![json!(user), json!(pass)])
}

/// `mining.extranonce.subscribe` (id=2), EthereumStratum only.
pub fn extranonce_subscribe() -> Request {
    Request::new(ID_EXTRANONCE_SUBSCRIBE, "mining.extranonce.subscribe", vec![])
}

/// `eth_getWork` kick (id=5), ETHPROXY only. Not strictly required but it
/// speeds up delivery of the first job.
pub fn work_kick() -> Request {
    Request::new(ID_WORK_KICK, "eth_getWork", vec![])
}

/// Solution submission (id=4), in the dialect's own shape.
///
/// `extranonce_hex_len` is the current extranonce prefix length in hex
/// chars; EthereumStratum submits only the nonce suffix beyond it.
pub fn submit(
    dialect: Dialect,
    user: &str,
    worker: &str,
    solution: &Solution,
    extranonce_hex_len: usize,
) -> Request {
    let nonce_hex = format!("{:016x}", solution.nonce);
    match dialect {
        Dialect::Stratum => Request::new(
            ID_SUBMIT,
            "mining.submit",
            vec![
                json!(user),
                json!(solution.work.job.to_hex()),
                json!(format!("0x{nonce_hex}")),
                json!(format!("0x{}", solution.work.header.to_hex())),
                json!(format!("0x{}", solution.mix_hash.to_hex())),
            ],
        ),
        Dialect::EthProxy => {
            let mut request = Request::new(
                ID_SUBMIT,
                "eth_submitWork",
                vec![
                    json!(format!("0x{nonce_hex}")),
                    json!(format!("0x{}", solution.work.header.to_hex())),
                    json!(format!("0x{}", solution.mix_hash.to_hex())),
                ],
            );
            request.worker = Some(worker.to_string());
            request
        }
        Dialect::EthereumStratum => {
            let job_hex = solution.work.job.to_hex();
            let job_len = (solution.work.job_len as usize).min(job_hex.len());
            let suffix_at = extranonce_hex_len.min(nonce_hex.len());
            Request::new(
                ID_SUBMIT,
                "mining.submit",
                vec![
                    json!(user),
                    json!(&job_hex[..job_len]),
                    json!(&nonce_hex[suffix_at..]),
                ],
            )
        }
    }
}

/// Hashrate report (id=6). `id_hex` is the stable per-session 32-byte
/// identifier, hex without prefix.
pub fn submit_hashrate(rate: u64, id_hex: &str) -> Request {
    let mut request = Request::new(
        ID_HASHRATE,
        "eth_submitHashrate",
        vec![json!(format!("0x{rate:x}")), json!(format!("0x{id_hex}"))],
    );
    request.jsonrpc = Some("2.0".to_string());
    request
}

#[derive(Serialize)]
struct VersionReply<'a> {
    error: (),
    id: u64,
    result: &'a str,
}

/// Reply to a server-initiated `client.get_version`, echoing its id.
pub fn version_reply(id: u64, version: &str) -> StratumResult<String> {
    Ok(serde_json::to_string(&VersionReply {
        error: (),
        id,
        result: version,
    })?)
}

/// Job fields extracted from a notify payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobNotice {
    /// Raw job id string as the pool sent it.
    pub job: String,
    pub seed: Hash256,
    pub header: Hash256,
    /// Share target. EthereumStratum pools set difficulty out of band, so
    /// no boundary rides on the notify itself.
    pub boundary: Option<Hash256>,
}

/// Extract job fields from a notify payload: `params` starting at index 1
/// for STRATUM, `result` starting at index 0 for ETHPROXY (where the job id
/// is the header hash itself), `params` `[job, seed, header, …]` for
/// EthereumStratum.
///
/// Returns `Ok(None)` when required fields are empty — pools emit such
/// placeholder frames between real jobs and they are skipped silently.
pub fn parse_notify(dialect: Dialect, payload: &Value) -> StratumResult<Option<JobNotice>> {
    let params = payload
        .as_array()
        .ok_or_else(|| StratumError::Protocol("notify payload is not an array".to_string()))?;

    let field = |index: usize| params.get(index).and_then(Value::as_str).unwrap_or("");

    match dialect {
        Dialect::EthereumStratum => {
            let job = field(0);
            let seed = field(1);
            let header = field(2);
            if header.is_empty() || seed.is_empty() {
                return Ok(None);
            }
            Ok(Some(JobNotice {
                job: job.to_string(),
                seed: parse_hash(seed, "seed")?,
                header: parse_hash(header, "header")?,
                boundary: None,
            }))
        }
        Dialect::Stratum | Dialect::EthProxy => {
            let base = if dialect == Dialect::EthProxy { 0 } else { 1 };
            // For ETHPROXY the first element doubles as the job id
            let job = field(0);
            let header = field(base);
            let seed = field(base + 1);
            let target = field(base + 2);
            if header.is_empty() || seed.is_empty() || target.is_empty() {
                return Ok(None);
            }
            // Some pools truncate leading zeros from the target; the
            // numeric hash parse restores them.
            Ok(Some(JobNotice {
                job: job.to_string(),
                seed: parse_hash(seed, "seed")?,
                header: parse_hash(header, "header")?,
                boundary: Some(parse_hash(target, "target")?),
            }))
        }
    }
}

fn parse_hash(s: &str, what: &str) -> StratumResult<Hash256> {
    Hash256::from_hex(s).map_err(|e| StratumError::Protocol(format!("bad {what} hash: {e}")))
}

/// Pool-assigned extranonce prefix, decoded from `mining.set_extranonce`
/// or the EthereumStratum subscribe response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtranoncePrefix {
    /// Prefix placed in the high bits of the 64-bit nonce space.
    pub start_nonce: u64,
    /// How many bits of the nonce are fixed by the prefix.
    pub size_bits: u8,
    /// Original hex length; submissions send only the nonce suffix
    /// beyond it.
    pub hex_len: usize,
}

/// Decode an extranonce hex string of up to 16 nibbles.
///
/// The string is right-padded with `'0'` to a full 64-bit value, so
/// `"af42"` fixes the top 16 bits of the search space at `0xaf42`.
pub fn parse_extranonce(enonce: &str) -> StratumResult<ExtranoncePrefix> {
    if enonce.len() > 16 {
        return Err(StratumError::Protocol(format!(
            "extranonce too long: {} nibbles",
            enonce.len()
        )));
    }
    let mut padded = enonce.to_string();
    while padded.len() < 16 {
        padded.push('0');
    }
    let prefix = Hash64::from_hex(&padded)
        .map_err(|e| StratumError::Protocol(format!("bad extranonce: {e}")))?;
    Ok(ExtranoncePrefix {
        start_nonce: u64::from_be_bytes(*prefix.as_bytes()),
        size_bits: (enonce.len() * 4) as u8,
        hex_len: enonce.len(),
    })
}

/// Convert an EthereumStratum share difficulty to a boundary hash.
///
/// Bit-exact port of the conversion pools and miners have settled on:
/// walk the difficulty down into the [0, 1] range in 2^32 steps, place
/// `floor(0xffff0000 / diff)` at the matching 32-bit limb of a
/// little-endian target, and byte-reverse the whole buffer. Difficulties
/// that do not convert to a finite limb (the `m == 0` guard) produce the
/// all-ones target.
pub fn diff_to_boundary(mut diff: f64) -> Hash256 {
    let mut k: usize = 6;
    while k > 0 && diff > 1.0 {
        diff /= 4294967296.0;
        k -= 1;
    }
    let m = (4294901760.0 / diff) as u64;

    let mut target = [0u8; 32];
    if m == 0 && k == 6 {
        target = [0xff; 32];
    } else {
        target[k * 4..k * 4 + 4].copy_from_slice(&(m as u32).to_le_bytes());
        target[(k + 1) * 4..(k + 1) * 4 + 4].copy_from_slice(&((m >> 32) as u32).to_le_bytes());
    }

    target.reverse();
    Hash256::from_bytes(target)
}

/// Approximate difficulty a boundary represents, for logging and stats.
///
/// Inverse of [`diff_to_boundary`] up to floating-point and floor
/// quantization: `max_target / boundary`, where max_target is the
/// difficulty-1 target `0xffff0000 << 192`.
pub fn boundary_to_diff(boundary: &Hash256) -> f64 {
    let target = U256::from_be_bytes(*boundary.as_bytes());
    if target == U256::ZERO {
        return 0.0;
    }
    4294901760.0 * 2.0_f64.powi(192) / target.to_f64_approx()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Hash256;
    use crate::stratum::messages::Work;

    fn sample_solution() -> Solution {
        Solution {
            nonce: 0xaf42_0000_dead_beef,
            mix_hash: Hash256::from_bytes([0x33; 32]),
            work: Work {
                job: Hash256::from_hex(
                    "4c8f121e00000000000000000000000000000000000000000000000000000000",
                )
                .unwrap(),
                job_len: 8,
                seed: Hash256::from_bytes([0x11; 32]),
                header: Hash256::from_bytes([0x22; 32]),
                boundary: Hash256::MAX,
                start_nonce: 0xaf42_0000_0000_0000,
                ex_size_bits: 16,
            },
            stale: false,
        }
    }

    #[test]
    fn test_subscribe_stratum() {
        let req = subscribe(Dialect::Stratum, "alice", "", "", "ashpool/0.1.0");
        assert_eq!(
            encode(&req).unwrap(),
            r#"{"id":1,"method":"mining.subscribe","params":[]}"#
        );
    }

    #[test]
    fn test_subscribe_ethereumstratum() {
        let req = subscribe(Dialect::EthereumStratum, "alice", "", "", "ashpool/0.1.0");
        assert_eq!(
            encode(&req).unwrap(),
            r#"{"id":1,"method":"mining.subscribe","params":["ashpool/0.1.0","EthereumStratum/1.0.0"]}"#
        );
    }

    #[test]
    fn test_login_ethproxy_splits_worker() {
        let req = subscribe(Dialect::EthProxy, "alice.worker1", "", "", "ashpool/0.1.0");
        assert_eq!(
            encode(&req).unwrap(),
            r#"{"id":1,"worker":"worker1","method":"eth_submitLogin","params":["alice"]}"#
        );
    }

    #[test]
    fn test_login_ethproxy_without_worker_suffix() {
        // no `.worker` suffix: the full user name doubles as the worker
        let req = subscribe(Dialect::EthProxy, "alice", "", "", "ashpool/0.1.0");
        assert_eq!(
            encode(&req).unwrap(),
            r#"{"id":1,"worker":"alice","method":"eth_submitLogin","params":["alice"]}"#
        );
    }

    #[test]
    fn test_login_ethproxy_with_email_and_hint() {
        // an explicit hint overrides the full-user fallback
        let req = subscribe(Dialect::EthProxy, "alice", "rig7", "a@b.c", "ashpool/0.1.0");
        assert_eq!(
            encode(&req).unwrap(),
            r#"{"id":1,"worker":"rig7","method":"eth_submitLogin","params":["alice","a@b.c"]}"#
        );
    }

    #[test]
    fn test_authorize() {
        let req = authorize("alice.worker1", "x");
        assert_eq!(
            encode(&req).unwrap(),
            r#"{"id":3,"method":"mining.authorize","params":["alice.worker1","x"]}"#
        );
    }

    #[test]
    fn test_submit_stratum() {
        let req = submit(Dialect::Stratum, "alice", "", &sample_solution(), 0);
        let line = encode(&req).unwrap();
        assert!(line.starts_with(r#"{"id":4,"method":"mining.submit","params":["alice","#));
        assert!(line.contains("\"0xaf420000deadbeef\""));
        assert!(line.contains(&format!("\"0x{}\"", "22".repeat(32))));
        assert!(line.contains(&format!("\"0x{}\"", "33".repeat(32))));
    }

    #[test]
    fn test_submit_ethproxy_carries_worker() {
        let req = submit(Dialect::EthProxy, "alice", "worker1", &sample_solution(), 0);
        let line = encode(&req).unwrap();
        assert!(line.starts_with(r#"{"id":4,"worker":"worker1","method":"eth_submitWork""#));
        // no user in params, nonce first
        assert!(line.contains(r#""params":["0xaf420000deadbeef"#));
    }

    #[test]
    fn test_submit_ethereumstratum_truncates() {
        // job cut back to its original length, nonce cut to the suffix
        // beyond the extranonce, neither 0x-prefixed
        let req = submit(Dialect::EthereumStratum, "alice", "", &sample_solution(), 4);
        assert_eq!(
            encode(&req).unwrap(),
            r#"{"id":4,"method":"mining.submit","params":["alice","4c8f121e","0000deadbeef"]}"#
        );
    }

    #[test]
    fn test_submit_ethereumstratum_overlong_job_len_clamped() {
        // a job_len past the stored 64 hex chars sends the full id
        let mut solution = sample_solution();
        solution.work.job_len = 80;
        let req = submit(Dialect::EthereumStratum, "alice", "", &solution, 4);
        let line = encode(&req).unwrap();
        let parsed: Request = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed.params[1].as_str().unwrap().len(), 64);
    }

    #[test]
    fn test_submit_hashrate_frame() {
        let id_hex = "aa".repeat(32);
        let req = submit_hashrate(0x1dcd6500, &id_hex);
        assert_eq!(
            encode(&req).unwrap(),
            format!(
                r#"{{"id":6,"jsonrpc":"2.0","method":"eth_submitHashrate","params":["0x1dcd6500","0x{id_hex}"]}}"#
            )
        );
    }

    #[test]
    fn test_version_reply_echoes_id() {
        assert_eq!(
            version_reply(11, "0.1.0").unwrap(),
            r#"{"error":null,"id":11,"result":"0.1.0"}"#
        );
    }

    #[test]
    fn test_encode_parse_encode_identity() {
        let solution = sample_solution();
        let requests = [
            subscribe(Dialect::Stratum, "alice", "", "", "ashpool/0.1.0"),
            subscribe(Dialect::EthProxy, "alice.w", "", "a@b.c", "ashpool/0.1.0"),
            subscribe(Dialect::EthereumStratum, "alice", "", "", "ashpool/0.1.0"),
            authorize("alice", "x"),
            extranonce_subscribe(),
            work_kick(),
            submit(Dialect::Stratum, "alice", "", &solution, 0),
            submit(Dialect::EthProxy, "alice", "w", &solution, 0),
            submit(Dialect::EthereumStratum, "alice", "", &solution, 4),
            submit_hashrate(12345, &"cd".repeat(32)),
        ];
        for request in requests {
            let line = encode(&request).unwrap();
            let reparsed: Request = serde_json::from_str(&line).unwrap();
            assert_eq!(reparsed, request);
            assert_eq!(encode(&reparsed).unwrap(), line);
        }
    }

    #[test]
    fn test_frame_completeness() {
        assert!(frame_is_complete(r#"{"id":1,"result":true}"#));
        assert!(frame_is_complete("  {\"id\":1}  "));
        assert!(!frame_is_complete(r#"{"id":3,"result":"#));
        assert!(!frame_is_complete(r#""id":3}"#));
        assert!(!frame_is_complete(""));
    }

    #[test]
    fn test_raw_frame_tolerates_null_and_string_ids() {
        let frame = parse_frame(r#"{"id":null,"method":"mining.notify","params":[]}"#).unwrap();
        assert_eq!(frame.id(), None);
        let frame = parse_frame(r#"{"id":"7","result":true}"#).unwrap();
        assert_eq!(frame.id(), None);
        let frame = parse_frame(r#"{"result":true}"#).unwrap();
        assert_eq!(frame.id(), None);
    }

    #[test]
    fn test_error_message_extraction() {
        let frame =
            parse_frame(r#"{"id":4,"result":null,"error":[23,"Low difficulty share",null]}"#)
                .unwrap();
        assert_eq!(frame.error_message(), Some("Low difficulty share"));
        let frame = parse_frame(r#"{"id":4,"result":true,"error":null}"#).unwrap();
        assert_eq!(frame.error_message(), None);
    }

    #[test]
    fn test_parse_notify_stratum() {
        let payload = json!([
            "1234",
            "0x2222222222222222222222222222222222222222222222222222222222222222",
            "0x1111111111111111111111111111111111111111111111111111111111111111",
            "0x00000000ffff0000000000000000000000000000000000000000000000000000"
        ]);
        let notice = parse_notify(Dialect::Stratum, &payload).unwrap().unwrap();
        assert_eq!(notice.job, "1234");
        assert_eq!(notice.header, Hash256::from_bytes([0x22; 32]));
        assert_eq!(notice.seed, Hash256::from_bytes([0x11; 32]));
        assert!(notice.boundary.is_some());
    }

    #[test]
    fn test_parse_notify_ethproxy_result_order() {
        // header first, and the header doubles as the job id
        let payload = json!([
            "0x2222222222222222222222222222222222222222222222222222222222222222",
            "0x1111111111111111111111111111111111111111111111111111111111111111",
            "0x00000000ffff0000000000000000000000000000000000000000000000000000"
        ]);
        let notice = parse_notify(Dialect::EthProxy, &payload).unwrap().unwrap();
        assert_eq!(notice.header, Hash256::from_bytes([0x22; 32]));
        assert_eq!(notice.seed, Hash256::from_bytes([0x11; 32]));
        assert!(notice.job.starts_with("0x22222222"));
    }

    #[test]
    fn test_parse_notify_ethereumstratum() {
        let payload = json!(["4c8f121e", "0x1111", "0x2222", "", true]);
        let notice = parse_notify(Dialect::EthereumStratum, &payload)
            .unwrap()
            .unwrap();
        assert_eq!(notice.job, "4c8f121e");
        assert!(notice.boundary.is_none());
    }

    #[test]
    fn test_parse_notify_short_target_padded() {
        // coinmine.pl sends targets with leading zeros stripped
        let payload = json!([
            "job",
            "0x2222222222222222222222222222222222222222222222222222222222222222",
            "0x1111111111111111111111111111111111111111111111111111111111111111",
            "0x8000"
        ]);
        let notice = parse_notify(Dialect::Stratum, &payload).unwrap().unwrap();
        let boundary = notice.boundary.unwrap();
        assert_eq!(boundary.as_bytes()[30], 0x80);
        assert_eq!(boundary.as_bytes()[0], 0x00);
    }

    #[test]
    fn test_parse_notify_empty_fields_skipped() {
        let payload = json!(["job", "", "", ""]);
        assert_eq!(parse_notify(Dialect::Stratum, &payload).unwrap(), None);
        let payload = json!(["job", "", ""]);
        assert_eq!(
            parse_notify(Dialect::EthereumStratum, &payload).unwrap(),
            None
        );
    }

    #[test]
    fn test_parse_notify_non_array_rejected() {
        assert!(parse_notify(Dialect::Stratum, &json!(true)).is_err());
    }

    #[test]
    fn test_extranonce_af42() {
        let prefix = parse_extranonce("af42").unwrap();
        assert_eq!(prefix.size_bits, 16);
        assert_eq!(prefix.hex_len, 4);
        assert_eq!(prefix.start_nonce, 0xaf42_0000_0000_0000);
    }

    #[test]
    fn test_extranonce_empty_and_full() {
        let prefix = parse_extranonce("").unwrap();
        assert_eq!(prefix.size_bits, 0);
        assert_eq!(prefix.start_nonce, 0);

        let prefix = parse_extranonce("0123456789abcdef").unwrap();
        assert_eq!(prefix.size_bits, 64);
        assert_eq!(prefix.start_nonce, 0x0123_4567_89ab_cdef);
    }

    #[test]
    fn test_extranonce_rejects_bad_input() {
        assert!(parse_extranonce("00112233445566778899").is_err());
        assert!(parse_extranonce("zz").is_err());
    }

    #[test]
    fn test_diff_to_boundary_one() {
        let boundary = diff_to_boundary(1.0);
        let mut expected = [0u8; 32];
        expected[4] = 0xff;
        expected[5] = 0xff;
        assert_eq!(boundary, Hash256::from_bytes(expected));
    }

    #[test]
    fn test_diff_to_boundary_powers_of_two_shift_limbs() {
        // difficulty 2^32 shifts the ffff0000 limb down one word
        let boundary = diff_to_boundary(4294967296.0);
        let mut expected = [0u8; 32];
        expected[8] = 0xff;
        expected[9] = 0xff;
        assert_eq!(boundary, Hash256::from_bytes(expected));
    }

    #[test]
    fn test_diff_to_boundary_non_finite_is_all_ones() {
        // set_difficulty is attacker-controlled; a difficulty that does
        // not convert to a finite limb must not panic, and falls back to
        // the permissive target
        assert_eq!(diff_to_boundary(f64::NAN), Hash256::MAX);
    }

    #[test]
    fn test_diff_to_boundary_round_trip() {
        // boundary_to_diff recovers the difficulty; floor quantization
        // keeps the error far below one part per million
        for diff in [
            0.0001,
            0.001,
            0.5,
            1.0,
            1.7,
            2.0,
            1024.0,
            4_000_000_000.0,
            2.0_f64.powi(40),
            2.0_f64.powi(63),
        ] {
            let boundary = diff_to_boundary(diff);
            let recovered = boundary_to_diff(&boundary);
            assert!(
                (recovered - diff).abs() / diff < 1e-6,
                "diff {diff}: recovered {recovered}"
            );
        }

        assert_eq!(boundary_to_diff(&Hash256::ZERO), 0.0);
    }
}
