//! Client side of the search service: registers with a server, ships
//! per-file term counts for a folder tree and runs ranked searches.

use anyhow::{anyhow, bail, Context, Result};
use search_core::frame::{read_frame, write_frame, DEFAULT_MAX_FRAME_LEN};
use search_core::protocol::{is_valid_path, IndexSubmission, Reply, Request, SHUTDOWN_NOTICE};
use search_core::tokenizer::count_terms;
use search_core::{ClientId, SearchHit};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Separator users type between search terms.
pub const QUERY_SEPARATOR: &str = " AND ";

#[derive(Debug, Default, Clone, PartialEq)]
pub struct IndexOutcome {
    pub files: usize,
    pub rejected: usize,
    pub bytes_read: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SearchOutcome {
    pub hits: Vec<SearchHit>,
    pub elapsed: Duration,
}

/// One request/reply connection to the server.
pub struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Connection {
    pub async fn open(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await.with_context(|| format!("failed to connect to {addr}"))?;
        let (reader, writer) = stream.into_split();
        Ok(Self { reader: BufReader::new(reader), writer })
    }

    pub async fn call(&mut self, request: &Request) -> Result<Reply> {
        write_frame(&mut self.writer, &request.encode()).await?;
        let frame = read_frame(&mut self.reader, DEFAULT_MAX_FRAME_LEN)
            .await?
            .ok_or_else(|| anyhow!("server closed the connection"))?;
        Ok(Reply::decode(&frame)?)
    }

    /// Sends `QUIT`; the server closes the session without replying.
    pub async fn quit(mut self) -> Result<()> {
        write_frame(&mut self.writer, &Request::Quit.encode()).await?;
        Ok(())
    }
}

/// Splits user input like `cat AND dog` into wire terms.
///
/// Documents matching any of the terms are returned, ranked by the summed
/// frequency of all terms, so the separator reads as AND but behaves as OR.
/// Terms containing `,` or `|` cannot be carried by a search request.
pub fn parse_query(input: &str) -> Result<Vec<String>> {
    input
        .split(QUERY_SEPARATOR)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| {
            if t.contains([',', '|']) {
                bail!("search term `{t}` may not contain `,` or `|`");
            }
            Ok(t.to_string())
        })
        .collect()
}

#[derive(Default)]
pub struct ClientEngine {
    conn: Option<Connection>,
    client_id: Option<ClientId>,
}

impl ClientEngine {
    pub fn new() -> Self { Self::default() }

    pub fn client_id(&self) -> Option<ClientId> { self.client_id }

    /// Connects and registers, replacing any previous session.
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<ClientId> {
        if self.conn.is_some() {
            self.disconnect().await?;
        }
        let mut conn = Connection::open(&format!("{host}:{port}")).await?;
        let id = match conn.call(&Request::Register).await? {
            Reply::Registered(id) => id,
            other => bail!("unexpected register reply: {other:?}"),
        };
        info!(client_id = id, host, port, "registered with server");
        self.conn = Some(conn);
        self.client_id = Some(id);
        Ok(id)
    }

    fn conn(&mut self) -> Result<&mut Connection> {
        self.conn.as_mut().ok_or_else(|| anyhow!("not connected; use `connect <ip> <port>` first"))
    }

    /// Submits every regular file below `folder`. A missing or non-directory
    /// path yields an empty outcome rather than an error.
    pub async fn index_folder(&mut self, folder: &Path) -> Result<IndexOutcome> {
        if !folder.is_dir() {
            warn!(path = %folder.display(), "invalid directory path");
            return Ok(IndexOutcome::default());
        }
        let root = absolute(folder)?;
        let client_id = self.client_id;
        let conn = self.conn()?;
        let start = Instant::now();
        let mut outcome = IndexOutcome::default();

        let walker = WalkDir::new(&root).sort_by_file_name().into_iter();
        for entry in walker.filter_map(|e| e.map_err(|err| warn!(error = %err, "skipping entry")).ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path().to_string_lossy().into_owned();
            if !is_valid_path(&path) {
                warn!(path = %path, "path cannot be sent over the wire");
                outcome.rejected += 1;
                continue;
            }
            let content = match tokio::fs::read(entry.path()).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(path = %path, error = %e, "failed to read file");
                    continue;
                }
            };
            outcome.bytes_read += content.len() as u64;
            let counts = count_terms(&String::from_utf8_lossy(&content));

            let request = Request::Index(IndexSubmission { client_id, path, counts });
            match conn.call(&request).await? {
                Reply::IndexOk => outcome.files += 1,
                Reply::IndexError => {
                    warn!(path = %entry.path().display(), "server rejected submission");
                    outcome.rejected += 1;
                }
                other => bail!("unexpected index reply: {other:?}"),
            }
        }
        outcome.elapsed = start.elapsed();
        debug!(files = outcome.files, bytes = outcome.bytes_read, "folder indexed");
        Ok(outcome)
    }

    pub async fn search(&mut self, terms: &[String]) -> Result<SearchOutcome> {
        let start = Instant::now();
        let hits = match self.conn()?.call(&Request::Search(terms.to_vec())).await? {
            Reply::Search(hits) => hits,
            other => bail!("unexpected search reply: {other:?}"),
        };
        Ok(SearchOutcome { hits, elapsed: start.elapsed() })
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.quit().await?;
            info!(client_id = ?self.client_id, "disconnected");
        }
        self.client_id = None;
        Ok(())
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

/// Listens on the server's notify endpoint. The task resolves to `true` once
/// `SERVER_SHUTDOWN` arrives, `false` if the endpoint closes without it.
pub async fn subscribe_shutdown(addr: &str) -> Result<JoinHandle<bool>> {
    let stream = TcpStream::connect(addr).await.with_context(|| format!("failed to subscribe at {addr}"))?;
    Ok(tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        loop {
            match read_frame(&mut reader, DEFAULT_MAX_FRAME_LEN).await {
                Ok(Some(frame)) if frame == SHUTDOWN_NOTICE => return true,
                Ok(Some(other)) => debug!(frame = %other, "ignoring notice"),
                Ok(None) => return false,
                Err(e) => {
                    debug!(error = %e, "notify stream failed");
                    return false;
                }
            }
        }
    }))
}
