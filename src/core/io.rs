use anyhow::{Context, Result, bail};
use flate2::read::MultiGzDecoder;
use memmap2::Mmap;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct MmapSource {
    mmap: Mmap,
}

impl MmapSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        // SAFETY: read-only file mapping.
        let mmap = unsafe { Mmap::map(&file) }.with_context(|| "mmap failed")?;
        Ok(Self { mmap })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InputKind {
    Plain,
    Gzip,
}

#[derive(Clone, Debug)]
pub enum ChunkData {
    MmapRange { start: usize, end: usize },
    Owned(Vec<u8>),
}

/// A run of whole lines. `first_line` is the 1-based line number of its first line.
#[derive(Clone, Debug)]
pub struct Chunk {
    pub index: usize,
    pub first_line: usize,
    pub data: ChunkData,
    pub timing: ChunkTiming,
}

pub const CHUNK_SIZE: usize = 4 * 1024 * 1024;
const GZIP_READ_BUF: usize = 1024 * 1024;

#[derive(Clone, Copy, Debug, Default)]
pub struct ChunkTiming {
    pub bytes: usize,
    pub decompress: Duration,
    pub align: Duration,
}

fn count_lines(bytes: &[u8]) -> usize {
    memchr::memchr_iter(b'\n', bytes).count()
}

pub struct MmapChunker {
    data: Arc<MmapSource>,
    pos: usize,
    chunk_size: usize,
    index: usize,
    line: usize,
}

impl MmapChunker {
    pub fn new(data: Arc<MmapSource>, chunk_size: usize) -> Self {
        Self {
            data,
            pos: 0,
            chunk_size: chunk_size.max(1),
            index: 0,
            line: 1,
        }
    }

    pub fn next_chunk(&mut self) -> Option<Chunk> {
        let bytes = self.data.bytes();
        let len = bytes.len();
        if self.pos >= len {
            return None;
        }
        let t_align = Instant::now();
        let start = self.pos;
        let target = (start + self.chunk_size).min(len);
        let end = match memchr::memchr(b'\n', &bytes[target - 1..]) {
            Some(i) => target + i,
            None => len,
        };
        self.pos = end;
        let chunk = Chunk {
            index: self.index,
            first_line: self.line,
            data: ChunkData::MmapRange { start, end },
            timing: ChunkTiming {
                bytes: end - start,
                decompress: Duration::ZERO,
                align: t_align.elapsed(),
            },
        };
        self.line += count_lines(&bytes[start..end]);
        self.index += 1;
        Some(chunk)
    }
}

pub struct GzipChunker {
    decoder: Box<dyn Read + Send>,
    buffer: Vec<u8>,
    read_buf: Vec<u8>,
    chunk_size: usize,
    index: usize,
    line: usize,
    eof: bool,
    acc_decompress: Duration,
}

impl GzipChunker {
    pub fn open(path: &Path, chunk_size: usize) -> Result<Self> {
        let decoder = open_gzip_reader(path)?;
        Ok(Self::from_reader(decoder, chunk_size))
    }

    fn from_reader(decoder: Box<dyn Read + Send>, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            decoder,
            buffer: Vec::with_capacity(chunk_size + (chunk_size / 4)),
            read_buf: vec![0u8; GZIP_READ_BUF.min(chunk_size.max(64))],
            chunk_size,
            index: 0,
            line: 1,
            eof: false,
            acc_decompress: Duration::ZERO,
        }
    }

    pub fn next_chunk(&mut self) -> Result<Option<Chunk>> {
        loop {
            if self.buffer.len() >= self.chunk_size || (self.eof && !self.buffer.is_empty()) {
                let t_align = Instant::now();
                let cut = if self.eof {
                    Some(self.buffer.len())
                } else {
                    memchr::memrchr(b'\n', &self.buffer).map(|i| i + 1)
                };
                if let Some(cut) = cut {
                    let tail = self.buffer.split_off(cut);
                    let chunk_bytes = std::mem::replace(&mut self.buffer, tail);
                    let lines = count_lines(&chunk_bytes);
                    let chunk = Chunk {
                        index: self.index,
                        first_line: self.line,
                        timing: ChunkTiming {
                            bytes: chunk_bytes.len(),
                            decompress: self.acc_decompress,
                            align: t_align.elapsed(),
                        },
                        data: ChunkData::Owned(chunk_bytes),
                    };
                    self.line += lines;
                    self.acc_decompress = Duration::ZERO;
                    self.index += 1;
                    return Ok(Some(chunk));
                }
                // a single line longer than the chunk size; keep reading
            }

            if self.eof {
                return Ok(None);
            }

            let t_read = Instant::now();
            let n = self.decoder.read(&mut self.read_buf).with_context(|| {
                format!("gzip decompression error at chunk {}", self.index)
            })?;
            self.acc_decompress += t_read.elapsed();
            if n == 0 {
                self.eof = true;
                continue;
            }
            self.buffer.extend_from_slice(&self.read_buf[..n]);
        }
    }
}

pub enum InputSource {
    Mmap { chunker: MmapChunker },
    Gzip { chunker: GzipChunker },
}

impl InputSource {
    pub fn open(path: &Path, chunk_size: usize) -> Result<(Self, Option<Arc<MmapSource>>, InputKind)> {
        let size = fs::metadata(path)
            .with_context(|| format!("failed to stat {}", path.display()))?
            .len();
        if size == 0 {
            bail!("input file is empty: {}", path.display());
        }
        let kind = detect_input_kind(path)?;
        match kind {
            InputKind::Plain => {
                let source = Arc::new(MmapSource::open(path)?);
                let chunker = MmapChunker::new(Arc::clone(&source), chunk_size);
                Ok((InputSource::Mmap { chunker }, Some(source), kind))
            }
            InputKind::Gzip => {
                let chunker = GzipChunker::open(path, chunk_size)?;
                Ok((InputSource::Gzip { chunker }, None, kind))
            }
        }
    }

    pub fn next_chunk(&mut self) -> Result<Option<Chunk>> {
        match self {
            InputSource::Mmap { chunker } => Ok(chunker.next_chunk()),
            InputSource::Gzip { chunker } => chunker.next_chunk(),
        }
    }
}

pub fn detect_input_kind(path: &Path) -> Result<InputKind> {
    if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
        let ext = ext.to_ascii_lowercase();
        if ext == "gz" {
            return Ok(InputKind::Gzip);
        }
    }
    let mut file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut magic = [0u8; 2];
    let n = file
        .read(&mut magic)
        .with_context(|| "failed to read magic bytes")?;
    if n == 2 && magic == [0x1f, 0x8b] {
        Ok(InputKind::Gzip)
    } else {
        Ok(InputKind::Plain)
    }
}

pub fn open_gzip_reader(path: &Path) -> Result<Box<dyn Read + Send>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    Ok(Box::new(MultiGzDecoder::new(BufReader::new(file))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    const LINES: &[u8] = b"{\"dna\":[\"A\"]}\n{\"dna\":[\"C\"]}\n\n{\"dna\":[\"G\"]}\n{\"dna\":[\"T\"]}";

    fn drain(source: &mut InputSource, mmap: Option<&MmapSource>) -> Vec<(usize, Vec<u8>)> {
        let mut out = Vec::new();
        while let Some(chunk) = source.next_chunk().unwrap() {
            let bytes = match &chunk.data {
                ChunkData::MmapRange { start, end } => mmap.unwrap().bytes()[*start..*end].to_vec(),
                ChunkData::Owned(data) => data.clone(),
            };
            out.push((chunk.first_line, bytes));
        }
        out
    }

    fn check_chunks(chunks: &[(usize, Vec<u8>)]) {
        assert!(chunks.len() > 1);
        let joined: Vec<u8> = chunks.iter().flat_map(|(_, b)| b.clone()).collect();
        assert_eq!(joined, LINES);
        let mut line = 1;
        for (i, (first_line, bytes)) in chunks.iter().enumerate() {
            assert_eq!(*first_line, line);
            if i + 1 < chunks.len() {
                assert_eq!(bytes.last(), Some(&b'\n'));
            }
            line += count_lines(bytes);
        }
    }

    #[test]
    fn plain_chunks_end_on_line_boundaries() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(LINES).unwrap();
        let (mut source, mmap, kind) = InputSource::open(file.path(), 20).unwrap();
        assert_eq!(kind, InputKind::Plain);
        let chunks = drain(&mut source, mmap.as_deref());
        check_chunks(&chunks);
    }

    #[test]
    fn gzip_is_detected_by_magic_bytes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(LINES).unwrap();
        file.write_all(&enc.finish().unwrap()).unwrap();
        assert_eq!(detect_input_kind(file.path()).unwrap(), InputKind::Gzip);

        let (mut source, mmap, kind) = InputSource::open(file.path(), 20).unwrap();
        assert_eq!(kind, InputKind::Gzip);
        assert!(mmap.is_none());
        let chunks = drain(&mut source, None);
        check_chunks(&chunks);
    }

    #[test]
    fn empty_input_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(InputSource::open(file.path(), CHUNK_SIZE).is_err());
    }
}
