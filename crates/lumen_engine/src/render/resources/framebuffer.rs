//! Offscreen framebuffers
//!
//! A [`Framebuffer`] owns its colour targets and an optional depth target.
//! Completeness is checked on creation and after every resize; an
//! incomplete framebuffer is a fatal renderer error.

use crate::render::api::{Attachment, FramebufferId, FramebufferStatus, GraphicsDevice, TextureId};
use crate::render::resources::ScreenTarget;
use crate::render::{RenderError, RenderResult};

/// Framebuffer with owned attachments
#[derive(Debug)]
pub struct Framebuffer {
    label: &'static str,
    framebuffer: FramebufferId,
    colors: Vec<ScreenTarget>,
    depth: Option<ScreenTarget>,
    width: u32,
    height: u32,
}

impl Framebuffer {
    /// Create a framebuffer from colour targets (attached to `Color(0..n)`)
    /// and an optional depth target.
    ///
    /// All targets must share one size. On an incomplete status the
    /// framebuffer and its targets are deleted and the status is returned
    /// as [`RenderError::IncompleteFramebuffer`].
    pub fn new(
        device: &mut dyn GraphicsDevice,
        label: &'static str,
        colors: Vec<ScreenTarget>,
        depth: Option<ScreenTarget>,
    ) -> RenderResult<Self> {
        let (width, height) = colors
            .first()
            .or(depth.as_ref())
            .map_or((0, 0), ScreenTarget::size);
        let framebuffer = match device.create_framebuffer() {
            Ok(framebuffer) => framebuffer,
            Err(err) => {
                for target in colors.into_iter().chain(depth) {
                    target.destroy(device);
                }
                return Err(err.into());
            }
        };
        let framebuffer = Self {
            label,
            framebuffer,
            colors,
            depth,
            width,
            height,
        };

        device.bind_framebuffer(Some(framebuffer.framebuffer));
        framebuffer.attach_all(device);
        let status = device.check_framebuffer_status();
        device.bind_framebuffer(None);

        if status != FramebufferStatus::Complete {
            log::error!("Framebuffer '{}' is incomplete: {:?}", label, status);
            framebuffer.destroy(device);
            return Err(RenderError::IncompleteFramebuffer { label, status });
        }
        log::debug!(
            "Created framebuffer '{}' ({}x{}, {} colour targets)",
            label,
            width,
            height,
            framebuffer.colors.len()
        );
        Ok(framebuffer)
    }

    fn attach_all(&self, device: &mut dyn GraphicsDevice) {
        let mut draw_buffers = Vec::with_capacity(self.colors.len());
        for (index, target) in (0u32..).zip(&self.colors) {
            let attachment = Attachment::Color(index);
            target.attach(device, attachment);
            draw_buffers.push(attachment);
        }
        if let Some(depth) = &self.depth {
            depth.attach(device, Attachment::Depth);
        }
        device.draw_buffers(&draw_buffers);
    }

    /// Bind for drawing and set the viewport to the framebuffer size
    pub fn bind(&self, device: &mut dyn GraphicsDevice) {
        device.bind_framebuffer(Some(self.framebuffer));
        device.viewport(0, 0, self.width, self.height);
    }

    /// Bind the default framebuffer
    pub fn unbind(device: &mut dyn GraphicsDevice) {
        device.bind_framebuffer(None);
    }

    /// Texture of colour target `index`, if it is texture-backed
    pub fn color_texture(&self, index: usize) -> Option<TextureId> {
        self.colors.get(index).and_then(ScreenTarget::texture_id)
    }

    /// Number of colour targets
    pub fn color_count(&self) -> usize {
        self.colors.len()
    }

    /// Reallocate every target and re-check completeness
    pub fn resize(&mut self, device: &mut dyn GraphicsDevice, width: u32, height: u32) -> RenderResult<()> {
        if (width, height) == (self.width, self.height) {
            return Ok(());
        }
        for target in self.colors.iter_mut().chain(self.depth.as_mut()) {
            target.resize(device, width, height)?;
        }
        self.width = width;
        self.height = height;

        device.bind_framebuffer(Some(self.framebuffer));
        let status = device.check_framebuffer_status();
        device.bind_framebuffer(None);
        if status != FramebufferStatus::Complete {
            log::error!("Framebuffer '{}' is incomplete after resize: {:?}", self.label, status);
            return Err(RenderError::IncompleteFramebuffer {
                label: self.label,
                status,
            });
        }
        log::trace!("Resized framebuffer '{}' to {}x{}", self.label, width, height);
        Ok(())
    }

    /// Diagnostic label
    pub const fn label(&self) -> &'static str {
        self.label
    }

    /// Device handle
    pub const fn framebuffer(&self) -> FramebufferId {
        self.framebuffer
    }

    /// Width and height
    pub const fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Delete the framebuffer and its targets
    pub fn destroy(self, device: &mut dyn GraphicsDevice) {
        device.delete_framebuffer(self.framebuffer);
        for target in self.colors.into_iter().chain(self.depth) {
            target.destroy(device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::{SamplerParams, TextureDesc, TextureFormat};
    use crate::render::backends::{HeadlessDevice, ObjectCounts};

    fn hdr_target(device: &mut HeadlessDevice, width: u32, height: u32) -> ScreenTarget {
        ScreenTarget::texture(device, TextureFormat::Rgba16F, width, height, SamplerParams::SCREEN).unwrap()
    }

    #[test]
    fn test_complete_framebuffer() {
        let mut device = HeadlessDevice::new(64, 32);
        let colors = vec![hdr_target(&mut device, 64, 32), hdr_target(&mut device, 64, 32)];
        let depth = ScreenTarget::renderbuffer(&mut device, TextureFormat::Depth24, 64, 32).unwrap();
        let framebuffer = Framebuffer::new(&mut device, "hdr", colors, Some(depth)).unwrap();

        assert_eq!(framebuffer.size(), (64, 32));
        assert_eq!(framebuffer.color_count(), 2);
        assert!(framebuffer.color_texture(1).is_some());
        assert!(framebuffer.color_texture(2).is_none());
        assert_eq!(device.bound_framebuffer(), None);
        assert_eq!(device.take_error(), None);
    }

    #[test]
    fn test_incomplete_framebuffer_is_fatal() {
        let mut device = HeadlessDevice::new(64, 32);
        let colors = vec![hdr_target(&mut device, 64, 32), hdr_target(&mut device, 32, 32)];
        let result = Framebuffer::new(&mut device, "mismatched", colors, None);

        assert_eq!(
            result.unwrap_err(),
            RenderError::IncompleteFramebuffer {
                label: "mismatched",
                status: FramebufferStatus::IncompleteDimensions,
            }
        );
        assert_eq!(device.object_counts(), ObjectCounts::default());
    }

    #[test]
    fn test_depth_format_on_colour_attachment_is_incomplete() {
        let mut device = HeadlessDevice::new(16, 16);
        let colors = vec![ScreenTarget::renderbuffer(&mut device, TextureFormat::Depth24, 16, 16).unwrap()];
        let result = Framebuffer::new(&mut device, "bad", colors, None);
        assert!(matches!(
            result,
            Err(RenderError::IncompleteFramebuffer {
                status: FramebufferStatus::IncompleteAttachment,
                ..
            })
        ));
    }

    #[test]
    fn test_bind_sets_viewport() {
        let mut device = HeadlessDevice::new(64, 32);
        let colors = vec![hdr_target(&mut device, 64, 32)];
        let framebuffer = Framebuffer::new(&mut device, "bright", colors, None).unwrap();
        device.take_commands();

        framebuffer.bind(&mut device);
        assert_eq!(device.bound_framebuffer(), Some(framebuffer.framebuffer()));
        assert!(device
            .commands()
            .contains(&crate::render::backends::DeviceCommand::Viewport { width: 64, height: 32 }));
        Framebuffer::unbind(&mut device);
        assert_eq!(device.bound_framebuffer(), None);
    }

    #[test]
    fn test_resize_reallocates_targets() {
        let mut device = HeadlessDevice::new(64, 32);
        let colors = vec![hdr_target(&mut device, 64, 32)];
        let depth = ScreenTarget::renderbuffer(&mut device, TextureFormat::Depth24, 64, 32).unwrap();
        let mut framebuffer = Framebuffer::new(&mut device, "hdr", colors, Some(depth)).unwrap();

        framebuffer.resize(&mut device, 128, 96).unwrap();
        assert_eq!(framebuffer.size(), (128, 96));
        let texture = framebuffer.color_texture(0).unwrap();
        assert_eq!(
            device.texture_desc(texture),
            Some(TextureDesc::new(128, 96, TextureFormat::Rgba16F))
        );
        assert_eq!(device.take_error(), None);

        framebuffer.destroy(&mut device);
        assert_eq!(device.object_counts(), ObjectCounts::default());
    }
}
