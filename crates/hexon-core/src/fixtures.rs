//! In-code test documents
//!
//! Every page carries the text `<prefix>-Page-<n>` so tests can check page
//! order after a round trip.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

/// Builder for small test PDFs with identifiable pages
#[derive(Debug, Clone)]
pub struct TestPdf {
    num_pages: u32,
    prefix: String,
    inherited_media_box: bool,
    nested_tree: bool,
    link_to_next_page: bool,
    thumbnails: bool,
    dangling_contents: Option<u32>,
    cyclic_contents: Vec<u32>,
    stale_info: bool,
    stale_annotation: bool,
    custom_media_box: Option<[i64; 4]>,
}

impl TestPdf {
    pub fn new(num_pages: u32, prefix: &str) -> Self {
        Self {
            num_pages,
            prefix: prefix.to_string(),
            inherited_media_box: false,
            nested_tree: false,
            link_to_next_page: false,
            thumbnails: false,
            dangling_contents: None,
            cyclic_contents: Vec::new(),
            stale_info: false,
            stale_annotation: false,
            custom_media_box: None,
        }
    }

    /// Put the MediaBox on the root Pages node instead of on each page
    pub fn inherited_media_box(mut self, yes: bool) -> Self {
        self.inherited_media_box = yes;
        self
    }

    /// Group pages in pairs under intermediate Pages nodes
    pub fn nested_tree(mut self, yes: bool) -> Self {
        self.nested_tree = yes;
        self
    }

    /// Give every page but the last a link annotation to the next page
    pub fn link_to_next_page(mut self, yes: bool) -> Self {
        self.link_to_next_page = yes;
        self
    }

    /// Attach a thumbnail image stream to every page
    pub fn with_thumbnails(mut self, yes: bool) -> Self {
        self.thumbnails = yes;
        self
    }

    /// Make the page at this 0-based index reference a missing content stream
    pub fn dangling_contents(mut self, index: u32) -> Self {
        self.dangling_contents = Some(index);
        self
    }

    /// Make the page at this 0-based index reference a pair of objects that
    /// only point at each other
    pub fn cyclic_contents(mut self, index: u32) -> Self {
        self.cyclic_contents.push(index);
        self
    }

    /// Point the trailer's `/Info` at an object that does not exist
    pub fn stale_info(mut self, yes: bool) -> Self {
        self.stale_info = yes;
        self
    }

    /// Give every page an `/Annots` entry naming an object that does not exist
    pub fn stale_annotation(mut self, yes: bool) -> Self {
        self.stale_annotation = yes;
        self
    }

    /// Use this MediaBox instead of US Letter
    pub fn media_box(mut self, rect: [i64; 4]) -> Self {
        self.custom_media_box = Some(rect);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut font = Dictionary::new();
        font.set("Type", Object::Name(b"Font".to_vec()));
        font.set("Subtype", Object::Name(b"Type1".to_vec()));
        font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
        let font_id = doc.add_object(font);

        let page_ids: Vec<ObjectId> = (0..self.num_pages).map(|_| doc.new_object_id()).collect();

        // Intermediate nodes, one per pair of pages
        let mut parents = vec![pages_id; page_ids.len()];
        let mut root_kids: Vec<ObjectId> = page_ids.clone();
        if self.nested_tree {
            root_kids.clear();
            for (pair, chunk) in page_ids.chunks(2).enumerate() {
                let node_id = doc.new_object_id();
                let mut node = Dictionary::new();
                node.set("Type", Object::Name(b"Pages".to_vec()));
                node.set("Parent", Object::Reference(pages_id));
                node.set("Count", Object::Integer(chunk.len() as i64));
                node.set(
                    "Kids",
                    Object::Array(chunk.iter().map(|id| Object::Reference(*id)).collect()),
                );
                doc.objects.insert(node_id, Object::Dictionary(node));
                for i in 0..chunk.len() {
                    parents[pair * 2 + i] = node_id;
                }
                root_kids.push(node_id);
            }
        }

        for (i, &page_id) in page_ids.iter().enumerate() {
            let content = format!(
                "BT /F1 12 Tf 50 700 Td ({}-Page-{}) Tj ET",
                self.prefix,
                i + 1
            );
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

            let mut page = Dictionary::new();
            page.set("Type", Object::Name(b"Page".to_vec()));
            page.set("Parent", Object::Reference(parents[i]));
            if self.dangling_contents == Some(i as u32) {
                page.set("Contents", Object::Reference((9999, 0)));
            } else if self.cyclic_contents.contains(&(i as u32)) {
                let first = doc.new_object_id();
                let second = doc.new_object_id();
                doc.objects.insert(first, Object::Reference(second));
                doc.objects.insert(second, Object::Reference(first));
                page.set("Contents", Object::Reference(first));
            } else {
                page.set("Contents", Object::Reference(content_id));
            }
            if !self.inherited_media_box {
                page.set("MediaBox", self.page_box());
            }
            if self.thumbnails {
                let mut thumb = Dictionary::new();
                thumb.set("Width", Object::Integer(32));
                thumb.set("Height", Object::Integer(32));
                thumb.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
                thumb.set("BitsPerComponent", Object::Integer(8));
                let pixels = (0..32 * 32 * 3).map(|v| (v % 251) as u8).collect();
                let thumb_id = doc.add_object(Stream::new(thumb, pixels));
                page.set("Thumb", Object::Reference(thumb_id));
            }
            if self.stale_annotation {
                page.set("Annots", Object::Array(vec![Object::Reference((8888, 0))]));
            }
            if self.link_to_next_page && i + 1 < page_ids.len() {
                let mut annot = Dictionary::new();
                annot.set("Type", Object::Name(b"Annot".to_vec()));
                annot.set("Subtype", Object::Name(b"Link".to_vec()));
                annot.set("Rect", rect(50, 50, 150, 80));
                annot.set("P", Object::Reference(page_id));
                annot.set(
                    "Dest",
                    Object::Array(vec![
                        Object::Reference(page_ids[i + 1]),
                        Object::Name(b"XYZ".to_vec()),
                        Object::Integer(0),
                        Object::Integer(792),
                        Object::Integer(0),
                    ]),
                );
                let annot_id = doc.add_object(annot);
                page.set("Annots", Object::Array(vec![Object::Reference(annot_id)]));
            }
            doc.objects.insert(page_id, Object::Dictionary(page));
        }

        let mut font_map = Dictionary::new();
        font_map.set("F1", Object::Reference(font_id));
        let mut resources = Dictionary::new();
        resources.set("Font", Object::Dictionary(font_map));

        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Count", Object::Integer(self.num_pages as i64));
        pages.set(
            "Kids",
            Object::Array(root_kids.iter().map(|id| Object::Reference(*id)).collect()),
        );
        pages.set("Resources", Object::Dictionary(resources));
        if self.inherited_media_box {
            pages.set("MediaBox", self.page_box());
        }
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", Object::Reference(catalog_id));
        if self.stale_info {
            doc.trailer.set("Info", Object::Reference((7777, 0)));
        }

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }
}

/// Plain N-page PDF with identifiable text on every page
pub fn create_test_pdf(num_pages: u32, prefix: &str) -> Vec<u8> {
    TestPdf::new(num_pages, prefix).build()
}

/// The `(...)` text shown on each page, in page order
pub fn page_texts(doc: &Document) -> Vec<String> {
    doc.get_pages()
        .into_values()
        .map(|page_id| {
            let content = doc.get_page_content(page_id).unwrap_or_default();
            let content = String::from_utf8_lossy(&content);
            match (content.find('('), content.rfind(')')) {
                (Some(start), Some(end)) if start < end => content[start + 1..end].to_string(),
                _ => String::new(),
            }
        })
        .collect()
}

/// RGB or RGBA PNG with a simple gradient
pub fn create_test_png(width: u32, height: u32, alpha: bool) -> Vec<u8> {
    let channels = if alpha { 4 } else { 3 };
    let mut pixels = Vec::with_capacity((width * height * channels) as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.push((x * 40) as u8);
            pixels.push((y * 40) as u8);
            pixels.push(128);
            if alpha {
                pixels.push(200);
            }
        }
    }

    let mut buffer = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut buffer, width, height);
        encoder.set_color(if alpha {
            png::ColorType::Rgba
        } else {
            png::ColorType::Rgb
        });
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&pixels).unwrap();
    }
    buffer
}

/// Header-only baseline JPEG: SOI, APP0, SOF0 and EOI markers
///
/// Enough for dimension parsing; the scan data is absent.
pub fn create_test_jpeg(width: u16, height: u16, components: u8) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8];
    // APP0 / JFIF
    bytes.extend_from_slice(&[
        0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00, 0x01, 0x00,
        0x01, 0x00, 0x00,
    ]);
    // SOF0
    let length = 8 + 3 * components as u16;
    bytes.extend_from_slice(&[0xFF, 0xC0]);
    bytes.extend_from_slice(&length.to_be_bytes());
    bytes.push(8);
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.push(components);
    for c in 0..components {
        bytes.extend_from_slice(&[c + 1, 0x11, 0x00]);
    }
    bytes.extend_from_slice(&[0xFF, 0xD9]);
    bytes
}

impl TestPdf {
    fn page_box(&self) -> Object {
        match self.custom_media_box {
            Some([x0, y0, x1, y1]) => rect(x0, y0, x1, y1),
            None => rect(0, 0, 612, 792),
        }
    }
}

fn rect(x0: i64, y0: i64, x1: i64, y1: i64) -> Object {
    Object::Array(vec![
        Object::Integer(x0),
        Object::Integer(y0),
        Object::Integer(x1),
        Object::Integer(y1),
    ])
}
