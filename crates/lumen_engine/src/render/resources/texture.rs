//! Textures
//!
//! [`Texture2D`] is a sampled RGBA8 image attached to scene entities.
//! [`ScreenTarget`] is a screen-sized render target backed either by a
//! texture (when later passes sample it) or by a renderbuffer (depth).

use crate::ecs::Component;
use crate::render::api::{
    Attachment, GraphicsDevice, RenderbufferId, SamplerParams, TextureDesc, TextureFormat,
    TextureId,
};
use crate::render::{RenderError, RenderResult};
use image::RgbaImage;

/// Sampled 2D texture
#[derive(Debug)]
pub struct Texture2D {
    texture: TextureId,
    desc: TextureDesc,
    params: SamplerParams,
}

impl Component for Texture2D {}

impl Texture2D {
    /// Upload an RGBA image with linear filtering and repeat wrapping
    pub fn from_image(device: &mut dyn GraphicsDevice, image: &RgbaImage) -> RenderResult<Self> {
        let (width, height) = image.dimensions();
        Self::from_pixels(device, width, height, image.as_raw(), SamplerParams::default())
    }

    /// Upload tightly packed RGBA8 pixels
    pub fn from_pixels(
        device: &mut dyn GraphicsDevice,
        width: u32,
        height: u32,
        pixels: &[u8],
        params: SamplerParams,
    ) -> RenderResult<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidArgument(format!(
                "texture size {width}x{height} is empty"
            )));
        }
        let desc = TextureDesc::new(width, height, TextureFormat::Rgba8);
        let texture = device.create_texture()?;
        device.active_texture(0);
        device.bind_texture(Some(texture));
        if let Err(err) = device.tex_image_2d(desc, Some(pixels)) {
            device.bind_texture(None);
            device.delete_texture(texture);
            return Err(err.into());
        }
        device.tex_parameters(params);
        device.bind_texture(None);
        log::trace!("Uploaded {}x{} texture", width, height);
        Ok(Self { texture, desc, params })
    }

    /// Bind to the active texture unit
    pub fn bind(&self, device: &mut dyn GraphicsDevice) {
        device.bind_texture(Some(self.texture));
    }

    /// Device handle
    pub const fn texture(&self) -> TextureId {
        self.texture
    }

    /// Width and height
    pub const fn size(&self) -> (u32, u32) {
        (self.desc.width, self.desc.height)
    }

    /// Sampling parameters
    pub const fn params(&self) -> SamplerParams {
        self.params
    }

    /// Delete the device texture
    pub fn destroy(self, device: &mut dyn GraphicsDevice) {
        device.delete_texture(self.texture);
    }
}

/// How a screen target is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    /// A texture that later passes can sample
    Texture,
    /// A renderbuffer, write-only
    Renderbuffer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetImage {
    Texture(TextureId),
    Renderbuffer(RenderbufferId),
}

/// Screen-sized render target
#[derive(Debug)]
pub struct ScreenTarget {
    image: TargetImage,
    format: TextureFormat,
    params: SamplerParams,
    width: u32,
    height: u32,
}

impl ScreenTarget {
    /// Texture-backed target
    pub fn texture(
        device: &mut dyn GraphicsDevice,
        format: TextureFormat,
        width: u32,
        height: u32,
        params: SamplerParams,
    ) -> RenderResult<Self> {
        let texture = device.create_texture()?;
        let mut target = Self {
            image: TargetImage::Texture(texture),
            format,
            params,
            width,
            height,
        };
        if let Err(err) = target.allocate(device) {
            target.destroy(device);
            return Err(err);
        }
        Ok(target)
    }

    /// Renderbuffer-backed target
    pub fn renderbuffer(
        device: &mut dyn GraphicsDevice,
        format: TextureFormat,
        width: u32,
        height: u32,
    ) -> RenderResult<Self> {
        let renderbuffer = device.create_renderbuffer()?;
        let mut target = Self {
            image: TargetImage::Renderbuffer(renderbuffer),
            format,
            params: SamplerParams::SCREEN,
            width,
            height,
        };
        if let Err(err) = target.allocate(device) {
            target.destroy(device);
            return Err(err);
        }
        Ok(target)
    }

    fn allocate(&mut self, device: &mut dyn GraphicsDevice) -> RenderResult<()> {
        match self.image {
            TargetImage::Texture(texture) => {
                device.active_texture(0);
                device.bind_texture(Some(texture));
                device.tex_image_2d(TextureDesc::new(self.width, self.height, self.format), None)?;
                device.tex_parameters(self.params);
                device.bind_texture(None);
            }
            TargetImage::Renderbuffer(renderbuffer) => {
                device.renderbuffer_storage(renderbuffer, self.format, self.width, self.height);
            }
        }
        Ok(())
    }

    /// Storage kind
    pub const fn kind(&self) -> AttachmentKind {
        match self.image {
            TargetImage::Texture(_) => AttachmentKind::Texture,
            TargetImage::Renderbuffer(_) => AttachmentKind::Renderbuffer,
        }
    }

    /// Texture handle, `None` for renderbuffers
    pub const fn texture_id(&self) -> Option<TextureId> {
        match self.image {
            TargetImage::Texture(texture) => Some(texture),
            TargetImage::Renderbuffer(_) => None,
        }
    }

    /// Texel format
    pub const fn format(&self) -> TextureFormat {
        self.format
    }

    /// Width and height
    pub const fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Attach to the bound framebuffer
    pub fn attach(&self, device: &mut dyn GraphicsDevice, attachment: Attachment) {
        match self.image {
            TargetImage::Texture(texture) => device.framebuffer_texture_2d(attachment, texture),
            TargetImage::Renderbuffer(renderbuffer) => device.framebuffer_renderbuffer(attachment, renderbuffer),
        }
    }

    /// Reallocate at a new size, keeping format and sampling parameters
    pub fn resize(&mut self, device: &mut dyn GraphicsDevice, width: u32, height: u32) -> RenderResult<()> {
        self.width = width;
        self.height = height;
        self.allocate(device)
    }

    /// Delete the device object
    pub fn destroy(self, device: &mut dyn GraphicsDevice) {
        match self.image {
            TargetImage::Texture(texture) => device.delete_texture(texture),
            TargetImage::Renderbuffer(renderbuffer) => device.delete_renderbuffer(renderbuffer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::api::{TextureFilter, TextureWrap};
    use crate::render::HeadlessDevice;

    #[test]
    fn test_texture_from_image() {
        let mut device = HeadlessDevice::new(8, 8);
        let image = RgbaImage::from_fn(4, 2, |x, _| image::Rgba([x as u8 * 60, 0, 0, 255]));
        let texture = Texture2D::from_image(&mut device, &image).unwrap();

        assert_eq!(texture.size(), (4, 2));
        assert_eq!(
            device.texture_desc(texture.texture()),
            Some(TextureDesc::new(4, 2, TextureFormat::Rgba8))
        );
        assert_eq!(
            device.texture_params(texture.texture()),
            Some(SamplerParams {
                filter: TextureFilter::Linear,
                wrap: TextureWrap::Repeat,
            })
        );
    }

    #[test]
    fn test_empty_texture_is_rejected() {
        let mut device = HeadlessDevice::new(8, 8);
        let result = Texture2D::from_pixels(&mut device, 0, 4, &[], SamplerParams::default());
        assert!(matches!(result, Err(RenderError::InvalidArgument(_))));
        assert_eq!(device.object_counts().textures, 0);
    }

    #[test]
    fn test_short_pixel_data_is_rejected() {
        let mut device = HeadlessDevice::new(8, 8);
        let result = Texture2D::from_pixels(&mut device, 2, 2, &[0; 8], SamplerParams::default());
        assert!(matches!(result, Err(RenderError::Device(_))));
        assert_eq!(device.object_counts().textures, 0);
    }

    #[test]
    fn test_resize_keeps_format_and_params() {
        let mut device = HeadlessDevice::new(8, 8);
        let mut target =
            ScreenTarget::texture(&mut device, TextureFormat::Rgba16F, 8, 8, SamplerParams::SCREEN).unwrap();
        target.resize(&mut device, 16, 4).unwrap();

        let texture = target.texture_id().unwrap();
        assert_eq!(
            device.texture_desc(texture),
            Some(TextureDesc::new(16, 4, TextureFormat::Rgba16F))
        );
        assert_eq!(device.texture_params(texture), Some(SamplerParams::SCREEN));

        let mut depth = ScreenTarget::renderbuffer(&mut device, TextureFormat::Depth24, 8, 8).unwrap();
        assert_eq!(depth.kind(), AttachmentKind::Renderbuffer);
        depth.resize(&mut device, 16, 4).unwrap();
        assert_eq!(depth.size(), (16, 4));
        assert!(depth.texture_id().is_none());
    }

    #[test]
    fn test_failed_target_allocation_deletes_texture() {
        let mut device = HeadlessDevice::new(8, 8);
        let result = ScreenTarget::texture(
            &mut device,
            TextureFormat::Rgba16F,
            crate::render::backends::MAX_TEXTURE_SIZE + 1,
            4,
            SamplerParams::SCREEN,
        );
        assert!(matches!(
            result,
            Err(RenderError::Device(crate::render::DeviceError::TextureTooLarge { .. }))
        ));
        assert_eq!(device.object_counts().textures, 0);
    }
}
