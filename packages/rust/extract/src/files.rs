//! Locating PDFs and naming their text outputs.

use std::path::{Path, PathBuf};

use nimescreen_shared::{NimeScreenError, Result, has_pdf_extension};

fn is_pdf_file(path: &Path) -> bool {
    path.is_file()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(has_pdf_extension)
}

/// PDFs directly inside `dir`, sorted by file name. A missing directory yields nothing.
pub fn list_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(dir).map_err(|e| NimeScreenError::io(dir, e))?;
    let mut pdfs = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| NimeScreenError::io(dir, e))?.path();
        if is_pdf_file(&path) {
            pdfs.push(path);
        }
    }
    pdfs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(pdfs)
}

/// PDFs anywhere below `root`, sorted by full path.
pub fn collect_pdfs(root: &Path) -> Result<Vec<PathBuf>> {
    let mut pdfs = Vec::new();
    if !root.is_dir() {
        return Ok(pdfs);
    }

    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = std::fs::read_dir(&dir).map_err(|e| NimeScreenError::io(&dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| NimeScreenError::io(&dir, e))?.path();
            if path.is_dir() {
                stack.push(path);
            } else if is_pdf_file(&path) {
                pdfs.push(path);
            }
        }
    }
    pdfs.sort();
    Ok(pdfs)
}

/// `paper.pdf` -> `paper.txt`; names without a PDF extension get `.txt` appended.
pub fn text_file_name(pdf_name: &str) -> String {
    if has_pdf_extension(pdf_name) {
        format!("{}.txt", &pdf_name[..pdf_name.len() - 4])
    } else {
        format!("{pdf_name}.txt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"%PDF-1.4").unwrap();
    }

    #[test]
    fn list_is_flat_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b.pdf"));
        touch(&dir.path().join("A.PDF"));
        touch(&dir.path().join("notes.txt"));
        touch(&dir.path().join("sub").join("c.pdf"));

        let names: Vec<String> = list_pdfs(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["A.PDF", "b.pdf"]);
    }

    #[test]
    fn collect_recurses() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("piano").join("Metadata_Match").join("x.pdf"));
        touch(&dir.path().join("organ").join("No_Metadata_Match").join("y.pdf"));
        touch(&dir.path().join("z.pdf"));

        let found = collect_pdfs(dir.path()).unwrap();
        assert_eq!(found.len(), 3);
        assert!(found.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn missing_dirs_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_pdfs(&dir.path().join("nope")).unwrap().is_empty());
        assert!(collect_pdfs(&dir.path().join("nope")).unwrap().is_empty());
    }

    #[test]
    fn text_names() {
        assert_eq!(text_file_name("nime2013_1.pdf"), "nime2013_1.txt");
        assert_eq!(text_file_name("SCAN.PDF"), "SCAN.txt");
        assert_eq!(text_file_name("odd"), "odd.txt");
    }
}
