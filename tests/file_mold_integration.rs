//! Integration tests for molds stored in files
//!
//! File molds are selected with the `file:` prefix and read lazily, so a
//! page can be larger than the memory it is built in.

use std::fs;
use std::path::PathBuf;

use page_builder::test_utils::RecordingServer;
use page_builder::{
    HttpMethod, Mold, PageArgument, PageBuilder, PageElement, ScanState, StorageKind, TransferEncoding, BLOCK_SIZE,
};
use pretty_assertions::assert_eq;

struct TempMold {
    path: PathBuf,
}

impl TempMold {
    fn new(name: &str, content: &str) -> Self {
        let path = std::env::temp_dir().join(format!("page-builder-{}-{}.htm", name, std::process::id()));
        fs::write(&path, content).unwrap();
        Self { path }
    }

    fn mold(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

impl Drop for TempMold {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[test]
fn test_file_mold_substitutes_tokens() {
    let file = TempMold::new("greeting", "<h1>Hello {{NAME}}</h1>\n");
    let mut element = PageElement::new(file.mold())
        .with_token("NAME", |args: &PageArgument| args.arg("name").unwrap_or("stranger").to_string());

    assert_eq!(element.mold().kind(), StorageKind::File);
    assert_eq!(element.approx_size(), 24);

    let args: PageArgument = vec![("name", "Ada")].into_iter().collect();
    assert_eq!(element.build(&args), "<h1>Hello Ada</h1>\n");
    assert_eq!(element.state(), ScanState::Ended);

    // a second build reopens the file
    assert_eq!(element.build(&PageArgument::new()), "<h1>Hello stranger</h1>\n");
}

#[test]
fn test_missing_file_builds_empty() {
    let mut element = PageElement::new("file:/nonexistent/page-builder/index.htm");
    assert_eq!(element.approx_size(), 0);
    assert_eq!(element.build(&PageArgument::new()), "");
    assert_eq!(element.state(), ScanState::Ended);
}

#[test]
fn test_mixed_storage_page() {
    let file = TempMold::new("body", "<main>{{CONTENT}}</main>");
    let page = PageBuilder::new("/")
        .with_element(PageElement::new("<body>"))
        .with_element(PageElement::new(file.mold()).with_token("CONTENT", |_: &PageArgument| "stored".to_string()))
        .with_element(PageElement::new(Mold::literal(String::from("</body>"))));

    assert_eq!(page.build_default(), "<body><main>stored</main></body>");
}

#[test]
fn test_large_file_streams_in_blocks() {
    let line = "<li>{{ITEM}}</li>\n";
    let content = line.repeat(200);
    let file = TempMold::new("large", &content);

    let mut page = PageBuilder::new("/list")
        .with_element(PageElement::new(file.mold()).with_token("ITEM", |_: &PageArgument| "x".to_string()));
    page.set_transfer_encoding(TransferEncoding::ByteStream).unwrap();

    let mut server = RecordingServer::new();
    assert!(page.handle(&mut server, HttpMethod::Get, "/list").unwrap());

    let expected = "<li>x</li>\n".repeat(200);
    assert_eq!(server.body_string(), expected);
    assert!(server.chunks().iter().all(|chunk| chunk.len() <= BLOCK_SIZE));
    assert!(server.terminated());
}
