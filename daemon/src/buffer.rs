use std::os::fd::AsFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use wayland_client::protocol::{wl_buffer, wl_shm, wl_shm_pool};
use wayland_client::{Dispatch, QueueHandle};

/// Compositor-side state of one `wl_buffer`, shared with its dispatch handler
#[derive(Debug, Default)]
pub struct BufferState {
    busy: AtomicBool,
}

impl BufferState {
    /// Called from the `wl_buffer.release` handler
    pub fn release(&self) {
        self.busy.store(false, Ordering::Release);
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Shared memory render target for one layer surface (ARGB8888)
pub struct ShmBuffer {
    pool: wl_shm_pool::WlShmPool,
    buffer: wl_buffer::WlBuffer,
    mmap: memmap2::MmapMut,
    state: Arc<BufferState>,
    width: u32,
    height: u32,
}

impl ShmBuffer {
    pub fn new<D>(
        shm: &wl_shm::WlShm,
        width: u32,
        height: u32,
        qh: &QueueHandle<D>,
    ) -> anyhow::Result<Self>
    where
        D: Dispatch<wl_shm_pool::WlShmPool, ()>
            + Dispatch<wl_buffer::WlBuffer, Arc<BufferState>>
            + 'static,
    {
        if width == 0 || height == 0 {
            anyhow::bail!("Refusing to allocate an empty {}x{} buffer", width, height);
        }

        let stride = width * 4; // 4 bytes per pixel (ARGB8888)
        let size = stride as usize * height as usize;

        let file = tempfile::tempfile()?;
        file.set_len(size as u64)?;

        // SAFETY: the file is private to this process and outlives the map
        let mmap = unsafe { memmap2::MmapMut::map_mut(&file)? };

        let pool = shm.create_pool(file.as_fd(), size as i32, qh, ());

        let state = Arc::new(BufferState::default());
        let buffer = pool.create_buffer(
            0,
            width as i32,
            height as i32,
            stride as i32,
            wl_shm::Format::Argb8888,
            qh,
            Arc::clone(&state),
        );

        Ok(Self {
            pool,
            buffer,
            mmap,
            state,
            width,
            height,
        })
    }

    pub fn fill_color(&mut self, r: u8, g: u8, b: u8, a: u8) {
        let color = u32::from_ne_bytes([b, g, r, a]); // ARGB8888 format

        for chunk in self.mmap.chunks_exact_mut(4) {
            chunk.copy_from_slice(&color.to_ne_bytes());
        }
    }

    /// Copy a BGRA frame into the buffer, row by row.
    ///
    /// Rows and columns beyond the buffer are clipped; uncovered buffer
    /// area keeps its previous contents.
    pub fn write_frame(&mut self, data: &[u8], width: u32, height: u32, stride: usize) {
        blit(&mut self.mmap, self.width, self.height, data, width, height, stride);
    }

    /// Mark the buffer as handed to the compositor until it is released
    pub fn mark_busy(&self) {
        self.state.busy.store(true, Ordering::Release);
    }

    pub fn is_busy(&self) -> bool {
        self.state.is_busy()
    }

    pub fn buffer(&self) -> &wl_buffer::WlBuffer {
        &self.buffer
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl Drop for ShmBuffer {
    fn drop(&mut self) {
        self.buffer.destroy();
        self.pool.destroy();
    }
}

fn blit(
    dst: &mut [u8],
    dst_width: u32,
    dst_height: u32,
    src: &[u8],
    src_width: u32,
    src_height: u32,
    src_stride: usize,
) {
    let dst_stride = dst_width as usize * 4;
    let row_bytes = dst_width.min(src_width) as usize * 4;
    let rows = dst_height.min(src_height) as usize;

    for row in 0..rows {
        let src_start = row * src_stride;
        let Some(src_row) = src.get(src_start..src_start + row_bytes) else {
            break;
        };
        let dst_start = row * dst_stride;
        dst[dst_start..dst_start + row_bytes].copy_from_slice(src_row);
    }
}

/// Parse a hex color string (e.g., "#FF5733" or "FF5733") to RGBA
pub fn parse_hex_color(color: &str) -> Option<(u8, u8, u8, u8)> {
    let color = color.trim_start_matches('#');

    if !color.is_ascii() || (color.len() != 6 && color.len() != 8) {
        return None;
    }

    let r = u8::from_str_radix(&color[0..2], 16).ok()?;
    let g = u8::from_str_radix(&color[2..4], 16).ok()?;
    let b = u8::from_str_radix(&color[4..6], 16).ok()?;
    let a = if color.len() == 8 {
        u8::from_str_radix(&color[6..8], 16).ok()?
    } else {
        255
    };

    Some((r, g, b, a))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#FF5733"), Some((255, 87, 51, 255)));
        assert_eq!(parse_hex_color("FF5733"), Some((255, 87, 51, 255)));
        assert_eq!(parse_hex_color("#FF573380"), Some((255, 87, 51, 128)));
        assert_eq!(parse_hex_color("000000"), Some((0, 0, 0, 255)));
        assert_eq!(parse_hex_color("invalid"), None);
        assert_eq!(parse_hex_color("#ééé"), None);
    }

    #[test]
    fn test_blit_honours_source_stride() {
        // 2x2 source with 4 bytes of row padding
        let src = [
            1, 1, 1, 1, 2, 2, 2, 2, 0, 0, 0, 0, //
            3, 3, 3, 3, 4, 4, 4, 4, 0, 0, 0, 0,
        ];
        let mut dst = [9u8; 16];
        blit(&mut dst, 2, 2, &src, 2, 2, 12);
        assert_eq!(dst, [1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4]);
    }

    #[test]
    fn test_blit_clips_to_destination() {
        let src: Vec<u8> = (0..3 * 3 * 4).map(|i| i as u8).collect();
        let mut dst = [0u8; 2 * 2 * 4];
        blit(&mut dst, 2, 2, &src, 3, 3, 12);
        assert_eq!(&dst[0..8], &src[0..8]);
        assert_eq!(&dst[8..16], &src[12..20]);
    }

    #[test]
    fn test_blit_smaller_source_leaves_rest_untouched() {
        let src = [5u8; 4];
        let mut dst = [0u8; 2 * 2 * 4];
        blit(&mut dst, 2, 2, &src, 1, 1, 4);
        assert_eq!(&dst[0..4], &[5, 5, 5, 5]);
        assert!(dst[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_blit_truncated_source_stops_early() {
        let src = [7u8; 8];
        let mut dst = [0u8; 2 * 2 * 4];
        blit(&mut dst, 2, 2, &src, 2, 2, 8);
        assert!(dst[..8].iter().all(|&b| b == 7));
        assert!(dst[8..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_buffer_state_release() {
        let state = BufferState::default();
        assert!(!state.is_busy());
        state.busy.store(true, Ordering::Release);
        assert!(state.is_busy());
        state.release();
        assert!(!state.is_busy());
    }
}
