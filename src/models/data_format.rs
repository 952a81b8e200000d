//! 数据格式配置
//!
//! 描述题库图片的目标格式：尺寸、输入编码、输出编码以及缩放策略。
//! 图片编解码只在一个封闭的 [`ImageCodec`] 集合内进行，由显式的格式标签选择。

use std::fmt;
use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 图片边长下限（像素）
pub const MIN_IMAGE_SIDE: u32 = 28;

/// 默认目标尺寸
pub const DEFAULT_IMAGE_SHAPE: (u32, u32) = (256, 256);

/// 支持的图片编解码器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageCodec {
    Jpeg,
    Png,
    WebP,
    Bmp,
    Gif,
}

impl ImageCodec {
    /// 从文件扩展名解析（不区分大小写，可带前导点）
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(ImageCodec::Jpeg),
            "png" => Some(ImageCodec::Png),
            "webp" => Some(ImageCodec::WebP),
            "bmp" => Some(ImageCodec::Bmp),
            "gif" => Some(ImageCodec::Gif),
            _ => None,
        }
    }

    /// 从文件路径的扩展名解析
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// 写文件时使用的扩展名
    pub fn extension(self) -> &'static str {
        match self {
            ImageCodec::Jpeg => "jpg",
            ImageCodec::Png => "png",
            ImageCodec::WebP => "webp",
            ImageCodec::Bmp => "bmp",
            ImageCodec::Gif => "gif",
        }
    }

    /// data URL 中使用的 MIME 类型
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageCodec::Jpeg => "image/jpeg",
            ImageCodec::Png => "image/png",
            ImageCodec::WebP => "image/webp",
            ImageCodec::Bmp => "image/bmp",
            ImageCodec::Gif => "image/gif",
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            ImageCodec::Jpeg => ImageFormat::Jpeg,
            ImageCodec::Png => ImageFormat::Png,
            ImageCodec::WebP => ImageFormat::WebP,
            ImageCodec::Bmp => ImageFormat::Bmp,
            ImageCodec::Gif => ImageFormat::Gif,
        }
    }

    /// 该格式是否能保存透明通道
    pub fn supports_alpha(self) -> bool {
        !matches!(self, ImageCodec::Jpeg | ImageCodec::Bmp)
    }

    /// 按本编码解码图片字节
    pub fn decode(self, bytes: &[u8]) -> image::ImageResult<DynamicImage> {
        image::load_from_memory_with_format(bytes, self.image_format())
    }

    /// 按本编码输出图片字节
    ///
    /// 不支持透明通道的格式先转换为 RGB8，其余转换为 RGBA8。
    pub fn encode(self, img: &DynamicImage) -> image::ImageResult<Vec<u8>> {
        let normalized = if self.supports_alpha() {
            DynamicImage::ImageRgba8(img.to_rgba8())
        } else {
            DynamicImage::ImageRgb8(img.to_rgb8())
        };

        let mut buf = Cursor::new(Vec::new());
        normalized.write_to(&mut buf, self.image_format())?;
        Ok(buf.into_inner())
    }
}

impl fmt::Display for ImageCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// 图片缩放策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizePolicy {
    /// 保持宽高比缩放到目标框内，居中放在灰色画布上
    #[default]
    Letterbox,
    /// 忽略宽高比直接拉伸到目标尺寸
    Stretch,
}

/// 题库的数据格式
///
/// 构造后不可变，只描述格式，不持有任何资源。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataFormat {
    image_shape: (u32, u32),
    input_codec: ImageCodec,
    output_codec: ImageCodec,
    resize_policy: ResizePolicy,
}

impl DataFormat {
    /// 创建数据格式
    ///
    /// # 参数
    /// - `image_shape`: 目标尺寸 (宽, 高)，两边都不能小于 28
    /// - `input_extension`: 源图片扩展名
    /// - `output_extension`: 输出图片扩展名
    pub fn new(
        image_shape: (u32, u32),
        input_extension: &str,
        output_extension: &str,
    ) -> Result<Self, ConfigError> {
        let (width, height) = image_shape;
        if width < MIN_IMAGE_SIDE || height < MIN_IMAGE_SIDE {
            return Err(ConfigError::InvalidDataFormat(format!(
                "图片尺寸 {}x{} 无效，宽和高都必须不小于 {}",
                width, height, MIN_IMAGE_SIDE
            )));
        }

        Ok(Self {
            image_shape,
            input_codec: parse_codec(input_extension)?,
            output_codec: parse_codec(output_extension)?,
            resize_policy: ResizePolicy::default(),
        })
    }

    /// 指定缩放策略
    pub fn with_resize_policy(mut self, policy: ResizePolicy) -> Self {
        self.resize_policy = policy;
        self
    }

    pub fn image_shape(&self) -> (u32, u32) {
        self.image_shape
    }

    pub fn input_codec(&self) -> ImageCodec {
        self.input_codec
    }

    pub fn output_codec(&self) -> ImageCodec {
        self.output_codec
    }

    pub fn resize_policy(&self) -> ResizePolicy {
        self.resize_policy
    }
}

fn parse_codec(ext: &str) -> Result<ImageCodec, ConfigError> {
    ImageCodec::from_extension(ext).ok_or_else(|| {
        ConfigError::InvalidDataFormat(format!(
            "不支持的图片扩展名: {:?}，可选: jpg, jpeg, png, webp, bmp, gif",
            ext
        ))
    })
}
