//! PDF page rasterization.
//!
//! The OCR stage consumes one PNG per page, in page order, at a fixed DPI.
//! Rasterization sits behind a trait: production uses the Poppler
//! `pdftoppm` tool through a scratch directory; tests use
//! [`FixtureRasterizer`].

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;
use tracing::instrument;

/// Rendering DPI used for OCR input.
pub const RASTER_DPI: u32 = 144;

/// One rendered page.
#[derive(Clone, Debug)]
pub struct PageImage {
    /// 0-based page number.
    pub index: usize,
    /// PNG-encoded page bitmap.
    pub png: Vec<u8>,
}

/// Rasterization failures.
#[derive(Debug, Error, Diagnostic)]
pub enum RasterError {
    #[error("rasterizer tool failed: {0}")]
    #[diagnostic(
        code(susi::raster::tool),
        help("pdftoppm (poppler-utils) must be installed and on PATH.")
    )]
    Tool(String),

    #[error("rasterizer I/O error: {0}")]
    #[diagnostic(code(susi::raster::io))]
    Io(#[from] std::io::Error),

    #[error("document contains no pages")]
    #[diagnostic(code(susi::raster::empty))]
    Empty,
}

/// Seam between the ingestion pipeline and the PDF renderer.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Render every page of `pdf` to a PNG, order preserved.
    async fn rasterize(&self, pdf: &[u8]) -> Result<Vec<PageImage>, RasterError>;
}

/// Production rasterizer shelling out to `pdftoppm`.
pub struct PdftoppmRasterizer {
    dpi: u32,
}

impl PdftoppmRasterizer {
    pub fn new() -> Self {
        Self { dpi: RASTER_DPI }
    }

    pub fn with_dpi(dpi: u32) -> Self {
        Self { dpi }
    }
}

impl Default for PdftoppmRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageRasterizer for PdftoppmRasterizer {
    #[instrument(skip(self, pdf), fields(bytes = pdf.len()))]
    async fn rasterize(&self, pdf: &[u8]) -> Result<Vec<PageImage>, RasterError> {
        let scratch = tempfile::tempdir()?;
        let input = scratch.path().join("input.pdf");
        tokio::fs::write(&input, pdf).await?;

        let prefix = scratch.path().join("page");
        let output = tokio::process::Command::new("pdftoppm")
            .arg("-png")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg(&input)
            .arg(&prefix)
            .output()
            .await
            .map_err(|err| RasterError::Tool(format!("failed to launch pdftoppm: {err}")))?;
        if !output.status.success() {
            return Err(RasterError::Tool(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        // pdftoppm emits page-1.png, page-2.png, ... zero-padded for larger
        // documents; sort by the parsed page number, not lexically.
        let mut numbered: Vec<(usize, std::path::PathBuf)> = Vec::new();
        let mut entries = tokio::fs::read_dir(scratch.path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(number) = name
                .strip_prefix("page-")
                .and_then(|rest| rest.strip_suffix(".png"))
                .and_then(|digits| digits.parse::<usize>().ok())
            {
                numbered.push((number, path));
            }
        }
        if numbered.is_empty() {
            return Err(RasterError::Empty);
        }
        numbered.sort_by_key(|(number, _)| *number);

        let mut pages = Vec::with_capacity(numbered.len());
        for (index, (_, path)) in numbered.into_iter().enumerate() {
            let png = tokio::fs::read(&path).await?;
            pages.push(PageImage { index, png });
        }
        Ok(pages)
    }
}

/// Deterministic rasterizer for tests: yields `page_count` synthetic pages.
pub struct FixtureRasterizer {
    page_count: usize,
}

impl FixtureRasterizer {
    pub fn new(page_count: usize) -> Self {
        Self { page_count }
    }
}

#[async_trait]
impl PageRasterizer for FixtureRasterizer {
    async fn rasterize(&self, _pdf: &[u8]) -> Result<Vec<PageImage>, RasterError> {
        if self.page_count == 0 {
            return Err(RasterError::Empty);
        }
        Ok((0..self.page_count)
            .map(|index| PageImage {
                index,
                png: format!("synthetic-page-{index}").into_bytes(),
            })
            .collect())
    }
}
