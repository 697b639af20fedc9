//! Text message grammar shared by client and server.
//!
//! Fields are separated by `|`, list items by `,` and key/value parts by `:`.

use crate::{ClientId, ProtocolError, SearchHit, TermCounts, UNKNOWN_OWNER};

pub const REGISTER_REQUEST: &str = "REGISTER REQUEST";
pub const INDEX_REQUEST: &str = "INDEX REQUEST";
pub const SEARCH_REQUEST: &str = "SEARCH REQUEST";
pub const QUIT: &str = "QUIT";
pub const INDEX_OK: &str = "INDEX REPLY: OK";
pub const INDEX_ERROR: &str = "INDEX REPLY: ERROR";
pub const SEARCH_REPLY: &str = "SEARCH REPLY";
pub const ERROR_PREFIX: &str = "ERROR: ";
pub const SHUTDOWN_NOTICE: &str = "SERVER_SHUTDOWN";

/// Characters a document path cannot carry: `|` would split search reply entries.
pub const RESERVED_PATH_CHARS: [char; 3] = ['|', '\n', '\r'];

pub fn is_valid_path(path: &str) -> bool {
    !path.is_empty() && !path.contains(RESERVED_PATH_CHARS)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSubmission {
    /// `None` when the sender did not present a positive client id.
    pub client_id: Option<ClientId>,
    pub path: String,
    pub counts: TermCounts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Register,
    Index(IndexSubmission),
    Search(Vec<String>),
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Registered(ClientId),
    IndexOk,
    IndexError,
    Search(Vec<SearchHit>),
    Error(String),
}

fn owner_field(owner: Option<ClientId>) -> String {
    match owner {
        Some(id) => id.to_string(),
        None => UNKNOWN_OWNER.to_string(),
    }
}

fn parse_owner(field: &str) -> Result<Option<ClientId>, ProtocolError> {
    let raw: i64 = field.trim().parse().map_err(|_| ProtocolError::BadInteger(field.to_string()))?;
    Ok(if raw > 0 { Some(raw as ClientId) } else { None })
}

fn parse_count(field: &str) -> Result<u64, ProtocolError> {
    field.parse().map_err(|_| ProtocolError::BadInteger(field.to_string()))
}

fn parse_counts(field: &str) -> Result<TermCounts, ProtocolError> {
    let mut counts = TermCounts::new();
    for entry in field.split(',').filter(|e| !e.is_empty()) {
        let (term, count) = entry
            .rsplit_once(':')
            .filter(|(term, _)| !term.is_empty())
            .ok_or_else(|| ProtocolError::BadTerm(entry.to_string()))?;
        let total = counts.entry(term.to_string()).or_insert(0);
        *total = total.checked_add(parse_count(count)?).ok_or_else(|| ProtocolError::BadInteger(entry.to_string()))?;
    }
    Ok(counts)
}

impl Request {
    pub fn decode(message: &str) -> Result<Self, ProtocolError> {
        if message.trim().is_empty() {
            return Err(ProtocolError::Empty);
        }
        let (kind, rest) = match message.split_once('|') {
            Some((kind, rest)) => (kind, Some(rest)),
            None => (message, None),
        };
        match kind.trim_end() {
            REGISTER_REQUEST => Ok(Request::Register),
            QUIT => Ok(Request::Quit),
            SEARCH_REQUEST => {
                let terms = rest
                    .map(|r| r.split(',').filter(|t| !t.is_empty()).map(str::to_string).collect())
                    .unwrap_or_default();
                Ok(Request::Search(terms))
            }
            INDEX_REQUEST => {
                let missing = |field| ProtocolError::MissingField { kind: INDEX_REQUEST, field };
                let rest = rest.ok_or_else(|| missing("client id"))?;
                let (client, rest) = rest.split_once('|').ok_or_else(|| missing("path"))?;
                let (path, terms) = rest.rsplit_once('|').ok_or_else(|| missing("terms"))?;
                if path.is_empty() {
                    return Err(missing("path"));
                }
                if !is_valid_path(path) {
                    return Err(ProtocolError::BadPath(path.to_string()));
                }
                Ok(Request::Index(IndexSubmission {
                    client_id: parse_owner(client)?,
                    path: path.to_string(),
                    counts: parse_counts(terms)?,
                }))
            }
            other => Err(ProtocolError::UnknownKind(other.to_string())),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Request::Register => REGISTER_REQUEST.to_string(),
            Request::Quit => QUIT.to_string(),
            Request::Search(terms) => format!("{SEARCH_REQUEST}|{}", terms.join(",")),
            Request::Index(sub) => {
                let mut pairs: Vec<_> = sub.counts.iter().collect();
                pairs.sort();
                let terms: Vec<String> = pairs.into_iter().map(|(t, c)| format!("{t}:{c}")).collect();
                format!("{INDEX_REQUEST}|{}|{}|{}", owner_field(sub.client_id), sub.path, terms.join(","))
            }
        }
    }
}

impl Reply {
    pub fn encode(&self) -> String {
        match self {
            Reply::Registered(id) => id.to_string(),
            Reply::IndexOk => INDEX_OK.to_string(),
            Reply::IndexError => INDEX_ERROR.to_string(),
            Reply::Error(reason) => format!("{ERROR_PREFIX}{reason}"),
            Reply::Search(hits) => {
                let entries: Vec<String> = hits
                    .iter()
                    .map(|h| format!("{}:{}:{}", owner_field(h.owner), h.path, h.freq))
                    .collect();
                format!("{SEARCH_REPLY}|{}", entries.join("|"))
            }
        }
    }

    pub fn decode(message: &str) -> Result<Self, ProtocolError> {
        let bad = || ProtocolError::BadReply(message.to_string());
        if message == INDEX_OK {
            return Ok(Reply::IndexOk);
        }
        if message == INDEX_ERROR {
            return Ok(Reply::IndexError);
        }
        if let Some(reason) = message.strip_prefix(ERROR_PREFIX) {
            return Ok(Reply::Error(reason.to_string()));
        }
        if let Some(rest) = message.strip_prefix(SEARCH_REPLY) {
            let mut hits = Vec::new();
            for entry in rest.split('|').filter(|e| !e.is_empty()) {
                // owner before the first `:`, frequency after the last, the path keeps anything in between
                let (owner, rest) = entry.split_once(':').ok_or_else(bad)?;
                let (path, freq) = rest.rsplit_once(':').ok_or_else(bad)?;
                hits.push(SearchHit { owner: parse_owner(owner)?, path: path.to_string(), freq: parse_count(freq)? });
            }
            return Ok(Reply::Search(hits));
        }
        message.trim().parse().map(Reply::Registered).map_err(|_| bad())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_index_submission() {
        let req = Request::decode("INDEX REQUEST|7|/data/a.txt|alpha:2,beta:10").unwrap();
        let Request::Index(sub) = req else { panic!("expected index request") };
        assert_eq!(sub.client_id, Some(7));
        assert_eq!(sub.path, "/data/a.txt");
        assert_eq!(sub.counts.get("alpha"), Some(&2));
        assert_eq!(sub.counts.get("beta"), Some(&10));
    }

    #[test]
    fn path_may_contain_colons_but_not_pipes() {
        let req = Request::decode("INDEX REQUEST|3|C:\\odd:name.txt|word:1").unwrap();
        let Request::Index(sub) = req else { panic!("expected index request") };
        assert_eq!(sub.path, "C:\\odd:name.txt");
        assert_eq!(sub.counts.len(), 1);

        assert_eq!(
            Request::decode("INDEX REQUEST|3|/odd|name.txt|word:1"),
            Err(ProtocolError::BadPath("/odd|name.txt".into()))
        );
        assert!(!is_valid_path("/odd|name.txt"));
        assert!(is_valid_path("/plain/name.txt"));
    }

    #[test]
    fn rejects_counts_that_overflow() {
        let raw = format!("INDEX REQUEST|1|/a|word:{},word:1", u64::MAX);
        assert!(matches!(Request::decode(&raw), Err(ProtocolError::BadInteger(_))));
        let raw = format!("INDEX REQUEST|1|/a|word:{}", u64::MAX);
        assert!(Request::decode(&raw).is_ok());
    }

    #[test]
    fn unregistered_sender_has_no_owner() {
        for raw in ["INDEX REQUEST|0|/a|", "INDEX REQUEST|-1|/a|"] {
            let Request::Index(sub) = Request::decode(raw).unwrap() else { panic!() };
            assert_eq!(sub.client_id, None);
            assert!(sub.counts.is_empty());
        }
    }

    #[test]
    fn rejects_malformed_index_submissions() {
        assert!(matches!(
            Request::decode("INDEX REQUEST|7|/a"),
            Err(ProtocolError::MissingField { field: "terms", .. })
        ));
        assert!(matches!(Request::decode("INDEX REQUEST"), Err(ProtocolError::MissingField { .. })));
        assert!(matches!(Request::decode("INDEX REQUEST|x|/a|w:1"), Err(ProtocolError::BadInteger(_))));
        assert!(matches!(Request::decode("INDEX REQUEST|1|/a|word"), Err(ProtocolError::BadTerm(_))));
        assert!(matches!(Request::decode("INDEX REQUEST|1|/a|word:many"), Err(ProtocolError::BadInteger(_))));
        assert!(matches!(Request::decode("INDEX REQUEST|1||w:1"), Err(ProtocolError::MissingField { field: "path", .. })));
    }

    #[test]
    fn decodes_other_kinds() {
        assert_eq!(Request::decode("REGISTER REQUEST"), Ok(Request::Register));
        assert_eq!(Request::decode("QUIT"), Ok(Request::Quit));
        assert_eq!(
            Request::decode("SEARCH REQUEST|cat,dog"),
            Ok(Request::Search(vec!["cat".into(), "dog".into()]))
        );
        assert_eq!(Request::decode("SEARCH REQUEST"), Ok(Request::Search(vec![])));
        assert_eq!(Request::decode(""), Err(ProtocolError::Empty));
        assert!(matches!(Request::decode("DELETE|x"), Err(ProtocolError::UnknownKind(_))));
    }

    #[test]
    fn index_request_encoding_is_stable() {
        let sub = IndexSubmission {
            client_id: None,
            path: "/a".into(),
            counts: [("zeta".to_string(), 1), ("alpha".to_string(), 4)].into_iter().collect(),
        };
        assert_eq!(Request::Index(sub).encode(), "INDEX REQUEST|-1|/a|alpha:4,zeta:1");
    }

    #[test]
    fn search_reply_wire_format() {
        let reply = Reply::Search(vec![
            SearchHit { owner: Some(7), path: "C:\\docs\\a.txt".into(), freq: 12 },
            SearchHit { owner: None, path: "/b".into(), freq: 3 },
        ]);
        let wire = reply.encode();
        assert_eq!(wire, "SEARCH REPLY|7:C:\\docs\\a.txt:12|-1:/b:3");
        assert_eq!(Reply::decode(&wire), Ok(reply));
        assert_eq!(Reply::Search(vec![]).encode(), "SEARCH REPLY|");
        assert_eq!(Reply::decode("SEARCH REPLY|"), Ok(Reply::Search(vec![])));
    }

    #[test]
    fn decodes_simple_replies() {
        assert_eq!(Reply::decode("42"), Ok(Reply::Registered(42)));
        assert_eq!(Reply::decode(INDEX_OK), Ok(Reply::IndexOk));
        assert_eq!(Reply::decode(INDEX_ERROR), Ok(Reply::IndexError));
        assert_eq!(Reply::decode("ERROR: nope"), Ok(Reply::Error("nope".into())));
        assert!(Reply::decode("garbage").is_err());
    }
}
