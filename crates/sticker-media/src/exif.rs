//! Sticker-pack metadata embedded into WebP artifacts.
//!
//! Chat clients read the pack descriptor from a JSON document stored under a
//! private tag (0x5741) of a minimal little-endian TIFF block in the WebP
//! `EXIF` chunk.

use bytes::Bytes;
use img_parts::riff::{RiffChunk, RiffContent};
use img_parts::webp::{WebP, CHUNK_ALPH, CHUNK_EXIF, CHUNK_ICCP, CHUNK_VP8, CHUNK_VP8L, CHUNK_VP8X};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{MediaError, MediaResult};

/// TIFF header, one IFD entry with tag 0x5741 of type UNDEFINED.
const TIFF_PREFIX: [u8; 14] = [
    0x49, 0x49, 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00, 0x01, 0x00, 0x41, 0x57, 0x07, 0x00,
];
/// Value offset: header (8) + entry count (2) + entry (12).
const TIFF_VALUE_OFFSET: [u8; 4] = [0x16, 0x00, 0x00, 0x00];

/// VP8X feature flags (first byte of the chunk).
const FLAG_ICC: u8 = 0b0010_0000;
const FLAG_ALPHA: u8 = 0b0001_0000;
const FLAG_EXIF: u8 = 0b0000_1000;

/// Start code of a VP8 key frame.
const VP8_KEYFRAME_MAGIC: [u8; 3] = [0x9d, 0x01, 0x2a];
/// Signature byte of a VP8L bitstream.
const VP8L_SIGNATURE: u8 = 0x2f;

/// Sticker-pack descriptor. Constant per deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StickerPackMetadata {
    #[serde(rename = "sticker-pack-id")]
    pub pack_id: String,
    #[serde(rename = "sticker-pack-name")]
    pub pack_name: String,
    #[serde(rename = "sticker-pack-publisher")]
    pub publisher: String,
    #[serde(rename = "android-app-store-link")]
    pub android_store_link: String,
    #[serde(rename = "ios-app-store-link")]
    pub ios_store_link: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emojis: Vec<String>,
}

impl Default for StickerPackMetadata {
    fn default() -> Self {
        Self {
            pack_id: "stickerize".to_string(),
            pack_name: "stickerize".to_string(),
            publisher: "stickerize".to_string(),
            android_store_link: String::new(),
            ios_store_link: String::new(),
            emojis: Vec::new(),
        }
    }
}

impl StickerPackMetadata {
    /// Create from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            pack_id: std::env::var("STICKER_PACK_ID").unwrap_or(defaults.pack_id),
            pack_name: std::env::var("STICKER_PACK_NAME").unwrap_or(defaults.pack_name),
            publisher: std::env::var("STICKER_PACK_PUBLISHER").unwrap_or(defaults.publisher),
            android_store_link: std::env::var("STICKER_PACK_ANDROID_LINK")
                .unwrap_or(defaults.android_store_link),
            ios_store_link: std::env::var("STICKER_PACK_IOS_LINK")
                .unwrap_or(defaults.ios_store_link),
            emojis: defaults.emojis,
        }
    }

    /// Serialize the descriptor as an EXIF block.
    pub fn exif_block(&self) -> MediaResult<Vec<u8>> {
        let json = serde_json::to_vec(self)?;
        let len = u32::try_from(json.len())
            .map_err(|_| MediaError::InvalidWebp("descriptor too large".to_string()))?;

        let mut block = Vec::with_capacity(TIFF_PREFIX.len() + 8 + json.len());
        block.extend_from_slice(&TIFF_PREFIX);
        block.extend_from_slice(&len.to_le_bytes());
        block.extend_from_slice(&TIFF_VALUE_OFFSET);
        block.extend_from_slice(&json);
        Ok(block)
    }

    /// Parse a block produced by [`exif_block`](Self::exif_block).
    pub fn from_exif_block(block: &[u8]) -> MediaResult<Self> {
        let header_len = TIFF_PREFIX.len() + 8;
        if block.len() < header_len || block[..TIFF_PREFIX.len()] != TIFF_PREFIX {
            return Err(MediaError::InvalidWebp("not a sticker EXIF block".to_string()));
        }
        Ok(serde_json::from_slice(&block[header_len..])?)
    }
}

/// Writes the sticker-pack descriptor into WebP artifacts.
#[derive(Debug, Clone)]
pub struct MetadataWriter {
    exif: Bytes,
}

impl MetadataWriter {
    pub fn new(metadata: &StickerPackMetadata) -> MediaResult<Self> {
        Ok(Self {
            exif: Bytes::from(metadata.exif_block()?),
        })
    }

    /// Return `webp` with its EXIF chunk replaced by the descriptor.
    ///
    /// The chunk carries the bare TIFF block. A simple-format file is
    /// promoted to the extended format, with the canvas read from its
    /// bitstream header; a header that does not parse is an error.
    pub fn embed(&self, webp: Vec<u8>) -> MediaResult<Vec<u8>> {
        let mut image = WebP::from_bytes(Bytes::from(webp))
            .map_err(|e| MediaError::InvalidWebp(e.to_string()))?;
        image.remove_chunks_by_id(CHUNK_EXIF);

        let vp8x = image.chunks().iter().position(|chunk| chunk.id() == CHUNK_VP8X);
        match vp8x {
            Some(pos) => {
                let chunk = &mut image.chunks_mut()[pos];
                let mut header = chunk_data(chunk)?.to_vec();
                if header.len() < 10 {
                    return Err(MediaError::InvalidWebp("truncated VP8X chunk".to_string()));
                }
                header[0] |= FLAG_EXIF;
                *chunk = RiffChunk::new(CHUNK_VP8X, RiffContent::Data(Bytes::from(header)));
            }
            None => {
                let header = extended_header(&image)?;
                image
                    .chunks_mut()
                    .insert(0, RiffChunk::new(CHUNK_VP8X, RiffContent::Data(header)));
            }
        }

        image
            .chunks_mut()
            .push(RiffChunk::new(CHUNK_EXIF, RiffContent::Data(self.exif.clone())));
        Ok(image.encoder().bytes().to_vec())
    }

    /// Rewrite the file at `path` in place.
    pub async fn embed_file(&self, path: &Path) -> MediaResult<u64> {
        let data = tokio::fs::read(path).await?;
        let tagged = self.embed(data)?;
        tokio::fs::write(path, &tagged).await?;
        Ok(tagged.len() as u64)
    }
}

fn chunk_data(chunk: &RiffChunk) -> MediaResult<&Bytes> {
    chunk
        .content()
        .data()
        .ok_or_else(|| MediaError::InvalidWebp("unexpected list chunk".to_string()))
}

/// VP8X payload for a simple-format file, with the EXIF flag set.
fn extended_header(image: &WebP) -> MediaResult<Bytes> {
    let mut flags = FLAG_EXIF;
    if image.chunk_by_id(CHUNK_ICCP).is_some() {
        flags |= FLAG_ICC;
    }
    if image.chunk_by_id(CHUNK_ALPH).is_some() {
        flags |= FLAG_ALPHA;
    }

    let (width, height) = if let Some(chunk) = image.chunk_by_id(CHUNK_VP8) {
        vp8_dimensions(chunk_data(chunk)?)?
    } else if let Some(chunk) = image.chunk_by_id(CHUNK_VP8L) {
        let (width, height, alpha) = vp8l_dimensions(chunk_data(chunk)?)?;
        if alpha {
            flags |= FLAG_ALPHA;
        }
        (width, height)
    } else {
        return Err(MediaError::InvalidWebp("no image bitstream".to_string()));
    };

    let mut header = Vec::with_capacity(10);
    header.extend_from_slice(&[flags, 0, 0, 0]);
    header.extend_from_slice(&(width - 1).to_le_bytes()[..3]);
    header.extend_from_slice(&(height - 1).to_le_bytes()[..3]);
    Ok(Bytes::from(header))
}

/// Canvas size from a lossy key frame header.
fn vp8_dimensions(data: &[u8]) -> MediaResult<(u32, u32)> {
    if data.len() < 10 {
        return Err(MediaError::InvalidWebp("truncated VP8 header".to_string()));
    }
    if data[0] & 1 != 0 {
        return Err(MediaError::InvalidWebp("VP8 frame is not a key frame".to_string()));
    }
    if data[3..6] != VP8_KEYFRAME_MAGIC {
        return Err(MediaError::InvalidWebp("bad VP8 start code".to_string()));
    }
    let width = u32::from(u16::from_le_bytes([data[6], data[7]]) & 0x3FFF);
    let height = u32::from(u16::from_le_bytes([data[8], data[9]]) & 0x3FFF);
    if width == 0 || height == 0 {
        return Err(MediaError::InvalidWebp("empty VP8 frame".to_string()));
    }
    Ok((width, height))
}

/// Canvas size and alpha hint from a lossless bitstream header.
fn vp8l_dimensions(data: &[u8]) -> MediaResult<(u32, u32, bool)> {
    if data.len() < 5 || data[0] != VP8L_SIGNATURE {
        return Err(MediaError::InvalidWebp("bad VP8L header".to_string()));
    }
    let bits = u32::from_le_bytes([data[1], data[2], data[3], data[4]]);
    let width = (bits & 0x3FFF) + 1;
    let height = ((bits >> 14) & 0x3FFF) + 1;
    let alpha = (bits >> 28) & 1 == 1;
    Ok((width, height, alpha))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal extended-format WebP: RIFF header plus a VP8X chunk.
    fn minimal_webp() -> Vec<u8> {
        let mut vp8x = Vec::new();
        vp8x.extend_from_slice(b"VP8X");
        vp8x.extend_from_slice(&10u32.to_le_bytes());
        vp8x.extend_from_slice(&[0u8; 4]); // flags + reserved
        vp8x.extend_from_slice(&[0xFF, 0x01, 0x00]); // width - 1 = 511
        vp8x.extend_from_slice(&[0xFF, 0x01, 0x00]); // height - 1 = 511

        let mut riff = Vec::new();
        riff.extend_from_slice(b"RIFF");
        riff.extend_from_slice(&((4 + vp8x.len()) as u32).to_le_bytes());
        riff.extend_from_slice(b"WEBP");
        riff.extend_from_slice(&vp8x);
        riff
    }

    #[test]
    fn test_exif_block_layout() {
        let metadata = StickerPackMetadata::default();
        let block = metadata.exif_block().unwrap();
        let json_len = serde_json::to_vec(&metadata).unwrap().len() as u32;

        assert_eq!(&block[..2], b"II");
        assert_eq!(&block[10..12], &[0x41, 0x57]);
        assert_eq!(&block[14..18], &json_len.to_le_bytes());
        assert_eq!(&block[18..22], &[0x16, 0, 0, 0]);

        let json: serde_json::Value = serde_json::from_slice(&block[22..]).unwrap();
        assert_eq!(json["sticker-pack-name"], "stickerize");
        assert!(json.get("emojis").is_none());
    }

    #[test]
    fn test_exif_block_parses_back() {
        let metadata = StickerPackMetadata {
            publisher: "ops".to_string(),
            ..Default::default()
        };
        let block = metadata.exif_block().unwrap();
        assert_eq!(StickerPackMetadata::from_exif_block(&block).unwrap(), metadata);
        assert!(StickerPackMetadata::from_exif_block(b"junk").is_err());
    }

    /// Simple-format lossy WebP around a 10-byte VP8 frame header.
    fn simple_webp(vp8: [u8; 10]) -> Vec<u8> {
        let mut riff = Vec::new();
        riff.extend_from_slice(b"RIFF");
        riff.extend_from_slice(&(4 + 8 + vp8.len() as u32).to_le_bytes());
        riff.extend_from_slice(b"WEBP");
        riff.extend_from_slice(b"VP8 ");
        riff.extend_from_slice(&(vp8.len() as u32).to_le_bytes());
        riff.extend_from_slice(&vp8);
        riff
    }

    /// Key frame header for a 512x512 canvas.
    const KEYFRAME_512: [u8; 10] = [0x50, 0x2a, 0x00, 0x9d, 0x01, 0x2a, 0x00, 0x02, 0x00, 0x02];

    fn raw_chunk(webp: Vec<u8>, id: [u8; 4]) -> Option<Bytes> {
        let parsed = WebP::from_bytes(Bytes::from(webp)).unwrap();
        parsed.chunk_by_id(id)?.content().data().cloned()
    }

    #[test]
    fn test_embed_sets_exif_chunk() {
        let metadata = StickerPackMetadata::default();
        let writer = MetadataWriter::new(&metadata).unwrap();

        let tagged = writer.embed(minimal_webp()).unwrap();

        let exif = raw_chunk(tagged.clone(), CHUNK_EXIF).unwrap();
        assert!(exif.starts_with(b"II*\0"));
        assert_eq!(StickerPackMetadata::from_exif_block(&exif).unwrap(), metadata);

        let vp8x = raw_chunk(tagged, CHUNK_VP8X).unwrap();
        assert_eq!(vp8x[0] & FLAG_EXIF, FLAG_EXIF);
    }

    #[test]
    fn test_embed_replaces_previous_exif() {
        let writer = MetadataWriter::new(&StickerPackMetadata::default()).unwrap();

        let once = writer.embed(minimal_webp()).unwrap();
        let twice = writer.embed(once.clone()).unwrap();

        assert_eq!(once.len(), twice.len());
        let parsed = WebP::from_bytes(Bytes::from(twice)).unwrap();
        assert_eq!(parsed.chunks_by_id(CHUNK_EXIF).count(), 1);
    }

    #[test]
    fn test_embed_promotes_simple_vp8() {
        let writer = MetadataWriter::new(&StickerPackMetadata::default()).unwrap();

        let tagged = writer.embed(simple_webp(KEYFRAME_512)).unwrap();
        let parsed = WebP::from_bytes(Bytes::from(tagged)).unwrap();

        let ids: Vec<[u8; 4]> = parsed.chunks().iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec![CHUNK_VP8X, CHUNK_VP8, CHUNK_EXIF]);
        assert_eq!(parsed.dimensions(), Some((512, 512)));

        let exif = parsed.chunk_by_id(CHUNK_EXIF).unwrap().content().data().unwrap();
        assert!(exif.starts_with(b"II*\0"));
    }

    #[test]
    fn test_embed_rejects_corrupt_vp8_frame() {
        let writer = MetadataWriter::new(&StickerPackMetadata::default()).unwrap();

        assert!(matches!(
            writer.embed(simple_webp([0u8; 10])),
            Err(MediaError::InvalidWebp(_))
        ));

        let mut interframe = KEYFRAME_512;
        interframe[0] |= 1;
        assert!(matches!(
            writer.embed(simple_webp(interframe)),
            Err(MediaError::InvalidWebp(_))
        ));
    }

    #[test]
    fn test_vp8l_dimensions() {
        // 100x50 with the alpha hint set
        let bits: u32 = 99 | (49 << 14) | (1 << 28);
        let mut data = vec![VP8L_SIGNATURE];
        data.extend_from_slice(&bits.to_le_bytes());

        assert_eq!(vp8l_dimensions(&data).unwrap(), (100, 50, true));
        assert!(vp8l_dimensions(&[0x00, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_embed_rejects_non_webp() {
        let writer = MetadataWriter::new(&StickerPackMetadata::default()).unwrap();
        assert!(matches!(
            writer.embed(b"\x89PNG not a webp".to_vec()),
            Err(MediaError::InvalidWebp(_))
        ));
    }

    #[tokio::test]
    async fn test_embed_file_in_place() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sticker.webp");
        tokio::fs::write(&path, minimal_webp()).await.unwrap();

        let writer = MetadataWriter::new(&StickerPackMetadata::default()).unwrap();
        let len = writer.embed_file(&path).await.unwrap();

        assert_eq!(len, tokio::fs::metadata(&path).await.unwrap().len());
        assert!(len > minimal_webp().len() as u64);
    }
}
