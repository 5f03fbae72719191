#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStep {
    Ignored,
    RequestNext(i32),
    Complete(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct MapDownload {
    pub name: String,
    pub crc: i32,
    pub size: i32,
    chunk: i32,
    buffer: Vec<u8>,
}

impl MapDownload {
    pub fn new(name: &str, crc: i32, size: i32) -> Self {
        Self {
            name: name.to_string(),
            crc,
            size,
            chunk: 0,
            buffer: Vec::with_capacity(size.max(0) as usize),
        }
    }

    pub fn next_chunk(&self) -> i32 {
        self.chunk
    }

    pub fn received(&self) -> usize {
        self.buffer.len()
    }

    pub fn accept(&mut self, last: bool, crc: i32, chunk: i32, data: &[u8]) -> DownloadStep {
        if data.is_empty() || crc != self.crc || chunk != self.chunk {
            log::debug!(
                "Ignoring map chunk {} (expected {}, crc {:08x})",
                chunk,
                self.chunk,
                crc
            );
            return DownloadStep::Ignored;
        }

        self.buffer.extend_from_slice(data);

        if last {
            log::info!("Map {} downloaded ({} bytes)", self.name, self.buffer.len());
            return DownloadStep::Complete(std::mem::take(&mut self.buffer));
        }

        self.chunk += 1;
        DownloadStep::RequestNext(self.chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_assemble_in_order() {
        let mut download = MapDownload::new("dm1", 7, 6);
        assert_eq!(download.accept(false, 7, 0, &[1, 2]), DownloadStep::RequestNext(1));
        assert_eq!(download.accept(false, 7, 1, &[3, 4]), DownloadStep::RequestNext(2));
        assert_eq!(
            download.accept(true, 7, 2, &[5, 6]),
            DownloadStep::Complete(vec![1, 2, 3, 4, 5, 6])
        );
    }

    #[test]
    fn test_mismatched_chunks_are_ignored() {
        let mut download = MapDownload::new("dm1", 7, 4);
        assert_eq!(download.accept(false, 8, 0, &[1]), DownloadStep::Ignored);
        assert_eq!(download.accept(false, 7, 1, &[1]), DownloadStep::Ignored);
        assert_eq!(download.accept(false, 7, 0, &[]), DownloadStep::Ignored);
        assert_eq!(download.received(), 0);
        assert_eq!(download.next_chunk(), 0);
        assert_eq!(download.accept(true, 7, 0, &[9]), DownloadStep::Complete(vec![9]));
    }
}
