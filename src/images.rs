//! Image XObject creation for image watermarks.
//!
//! JPEG input is identified by its `FF D8` magic bytes and embedded as-is
//! behind a DCTDecode filter; everything else the `image` crate can decode
//! (PNG, TIFF) is re-packed as flate-compressed 8-bit RGB.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::xref::XrefTable;
use image::GenericImageView;
use std::io::Read;

/// Build an image XObject from a byte reader and install it in the table.
///
/// Returns the object reference and the pixel dimensions.
pub fn create_image_resource<R: Read>(
    xref: &mut XrefTable,
    mut reader: R,
) -> Result<(ObjectRef, i32, i32)> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;

    let img = image::load_from_memory(&data).map_err(|e| Error::Image(e.to_string()))?;
    let (width, height) = img.dimensions();

    let (dict, payload) = if data.starts_with(b"\xff\xd8") {
        jpeg_xobject(&img, data)
    } else {
        rgb_xobject(&img)?
    };

    let obj = Object::Stream {
        dict,
        data: bytes::Bytes::from(payload),
    };
    Ok((xref.add_object(obj), width as i32, height as i32))
}

fn base_image_dict(width: u32, height: u32) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.insert("Type".to_string(), Object::Name("XObject".to_string()));
    dict.insert("Subtype".to_string(), Object::Name("Image".to_string()));
    dict.insert("Width".to_string(), Object::Integer(width as i64));
    dict.insert("Height".to_string(), Object::Integer(height as i64));
    dict.insert("BitsPerComponent".to_string(), Object::Integer(8));
    dict
}

/// JPEG passthrough: the original bytes stay DCT-encoded.
fn jpeg_xobject(img: &image::DynamicImage, data: Vec<u8>) -> (Dictionary, Vec<u8>) {
    let (width, height) = img.dimensions();
    let mut dict = base_image_dict(width, height);

    let color_space = match img.color() {
        image::ColorType::L8 | image::ColorType::L16 => "DeviceGray",
        _ => "DeviceRGB",
    };
    dict.insert("ColorSpace".to_string(), Object::Name(color_space.to_string()));
    dict.insert("Filter".to_string(), Object::Name("DCTDecode".to_string()));
    dict.insert("Length".to_string(), Object::Integer(data.len() as i64));

    (dict, data)
}

/// Generic path: decode, re-pack as flate-compressed DeviceRGB.
fn rgb_xobject(img: &image::DynamicImage) -> Result<(Dictionary, Vec<u8>)> {
    let (width, height) = img.dimensions();
    let raw = img.to_rgb8().into_raw();

    let mut dict = base_image_dict(width, height);
    dict.insert("ColorSpace".to_string(), Object::Name("DeviceRGB".to_string()));
    let payload = crate::filters::encode_stream(&mut dict, &raw)?;

    Ok((dict, payload.to_vec()))
}
