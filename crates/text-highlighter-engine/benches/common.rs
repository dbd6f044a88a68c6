// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
#[allow(dead_code)]
pub fn generate_markdown_content(size: usize) -> String {
    let base = "# Title\n\nParagraph with *some emphasised* content and a [link](https://example.com).\n\n- Bullet point with **bold** text\n- Another item\n\n> Quoted words to highlight\n\n";
    base.repeat(size)
}
