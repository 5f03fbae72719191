#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub datagrams_sent: u64,
    pub datagrams_received: u64,
    pub datagrams_dropped: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl NetworkStats {
    pub fn record_sent(&mut self, bytes: usize) {
        self.datagrams_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    pub fn record_received(&mut self, bytes: usize) {
        self.datagrams_received += 1;
        self.bytes_received += bytes as u64;
    }

    pub fn drop_percent(&self) -> f32 {
        let total = self.datagrams_received + self.datagrams_dropped;
        if total == 0 {
            return 0.0;
        }
        self.datagrams_dropped as f32 * 100.0 / total as f32
    }
}
