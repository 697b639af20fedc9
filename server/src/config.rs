use search_core::frame::DEFAULT_MAX_FRAME_LEN;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    /// Public request/reply port; 0 picks an ephemeral port.
    pub port: u16,
    /// Number of concurrent request handlers.
    pub workers: usize,
    /// Requests that may wait for a free handler before senders are held back.
    pub queue_depth: usize,
    pub max_frame_len: usize,
    /// Port for shutdown notices; `None` disables the endpoint.
    pub notify_port: Option<u16>,
    /// Clear the index store before accepting connections.
    pub reset_on_start: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 12345,
            workers: 4,
            queue_depth: 1024,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            notify_port: None,
            reset_on_start: true,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String { format!("{}:{}", self.host, self.port) }

    pub fn notify_addr(&self) -> Option<String> {
        self.notify_port.map(|port| format!("{}:{}", self.host, port))
    }
}
