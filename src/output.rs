use crate::error::Result;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};
use tracing::{info, warn};

/// Write `bytes` to `path`; a failed write leaves no partial file behind.
pub fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Err(e) = fs::write(path, bytes) {
        if path.exists() {
            if let Err(rm) = fs::remove_file(path) {
                warn!(path = %path.display(), error = %rm, "could not remove partial export");
            }
        }
        return Err(e.into());
    }
    info!(path = %path.display(), bytes = bytes.len(), "export written");
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    write_bytes(path, s.as_bytes())
}

/// File name for an export built from the selected filters:
/// `("classificacao", ["5º Ano", "MATEMÁTICA", "2019"], "csv")` gives
/// `classificacao_5_ano_matematica_2019.csv`.
pub fn export_name(prefix: &str, parts: &[&str], extension: &str) -> String {
    let mut name = prefix.to_string();
    for part in parts {
        name.push('_');
        name.push_str(&slug(part));
    }
    format!("{}.{}", name, extension)
}

fn slug(s: &str) -> String {
    let mut out = String::new();
    for c in s.to_lowercase().chars() {
        let c = match c {
            'á' | 'à' | 'â' | 'ã' => 'a',
            'é' | 'ê' => 'e',
            'í' => 'i',
            'ó' | 'ô' | 'õ' => 'o',
            'ú' => 'u',
            'ç' => 'c',
            c => c,
        };
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
        }
    }
    out.trim_end_matches('_').to_string()
}

pub fn output_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(name)
}

pub fn preview_table<T>(title: &str, note: Option<&str>, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("\n{}", title);
    if let Some(n) = note {
        println!("({})", n);
    }
    println!();
    preview_table_rows(rows, max_rows);
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}", table_str);
    if rows.len() > max_rows {
        println!("... {} more rows", rows.len() - max_rows);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn export_names_are_filesystem_safe() {
        assert_eq!(
            export_name("classificacao", &["5º Ano", "MATEMÁTICA", "2019"], "csv"),
            "classificacao_5_ano_matematica_2019.csv"
        );
        assert_eq!(
            export_name("quartis", &["LÍNGUA PORTUGUESA"], "pdf"),
            "quartis_lingua_portuguesa.pdf"
        );
    }

    #[test]
    fn writes_bytes_and_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.csv");
        write_bytes(&path, b"x,y\n").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"x,y\n");

        let json = dir.path().join("a.json");
        write_json(&json, &vec![1, 2]).unwrap();
        assert!(fs::read_to_string(&json).unwrap().contains('1'));
    }

    #[test]
    fn failed_write_reports_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("a.pdf");
        assert!(write_bytes(&path, b"%PDF").is_err());
        assert!(!path.exists());
    }
}
