use csv::{ReaderBuilder, Trim, WriterBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::AppResult;

/// A single CSV file with a fixed header row.
///
/// Reads load the whole file and skip rows that fail to deserialize. Writes
/// only ever append one row; a failed append truncates the file back to its
/// previous length. Callers serialize concurrent writers themselves.
#[derive(Debug, Clone)]
pub struct CsvTable {
    path: PathBuf,
    header: Vec<&'static str>,
}

impl CsvTable {
    pub fn new(path: impl Into<PathBuf>, header: &[&'static str]) -> Self {
        Self {
            path: path.into(),
            header: header.to_vec(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 文件不存在或为空时创建并写入表头
    pub fn ensure(&self) -> AppResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let is_empty = match fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };

        if is_empty {
            let mut writer = WriterBuilder::new().from_path(&self.path)?;
            writer.write_record(&self.header)?;
            writer.flush()?;
        }
        Ok(())
    }

    pub fn read_all<T: DeserializeOwned>(&self) -> AppResult<Vec<T>> {
        self.read_where(|_: &T| true)
    }

    pub fn read_where<T, P>(&self, keep: P) -> AppResult<Vec<T>>
    where
        T: DeserializeOwned,
        P: Fn(&T) -> bool,
    {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .trim(Trim::All)
            .from_reader(file);

        let mut rows = Vec::new();
        for (i, result) in reader.deserialize::<T>().enumerate() {
            match result {
                Ok(row) if keep(&row) => rows.push(row),
                Ok(_) => {}
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    // 行号从 1 开始，第 1 行是表头
                    log::warn!(
                        "Skipping malformed row {} in {}: {e}",
                        i + 2,
                        self.path.display()
                    );
                }
            }
        }
        Ok(rows)
    }

    /// Appends one row and returns the file length before the append, which
    /// can later be passed to [`CsvTable::truncate`] to undo it.
    pub fn append<T: Serialize>(&self, row: &T) -> AppResult<u64> {
        self.ensure()?;

        let mut file = OpenOptions::new().read(true).append(true).open(&self.path)?;
        let previous_len = file.metadata()?.len();

        if let Err(e) = Self::write_row(&mut file, previous_len, row) {
            if let Err(undo) = file.set_len(previous_len) {
                log::error!(
                    "Failed to roll back partial append to {}: {undo}",
                    self.path.display()
                );
            }
            return Err(e);
        }
        Ok(previous_len)
    }

    pub fn truncate(&self, len: u64) -> AppResult<()> {
        let file = OpenOptions::new().write(true).open(&self.path)?;
        file.set_len(len)?;
        file.sync_data()?;
        Ok(())
    }

    fn write_row<T: Serialize>(file: &mut File, len: u64, row: &T) -> AppResult<()> {
        // 手工编辑过的文件可能缺少结尾换行
        if len > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))?;
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                file.write_all(b"\n")?;
            }
        }

        {
            let mut writer = WriterBuilder::new().has_headers(false).from_writer(&mut *file);
            writer.serialize(row)?;
            writer.flush()?;
        }
        file.sync_data()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        name: String,
        amount: f64,
    }

    fn row(name: &str, amount: f64) -> Row {
        Row {
            name: name.into(),
            amount,
        }
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let table = CsvTable::new(dir.path().join("none.csv"), &["name", "amount"]);
        let rows: Vec<Row> = table.read_all().unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_ensure_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let table = CsvTable::new(dir.path().join("nested/t.csv"), &["name", "amount"]);
        table.ensure().unwrap();
        table.ensure().unwrap();
        let content = fs::read_to_string(table.path()).unwrap();
        assert_eq!(content, "name,amount\n");
    }

    #[test]
    fn test_append_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let table = CsvTable::new(dir.path().join("t.csv"), &["name", "amount"]);
        table.append(&row("a", 1.5)).unwrap();
        table.append(&row("b, with comma", 2.0)).unwrap();

        let rows: Vec<Row> = table.read_all().unwrap();
        assert_eq!(rows, vec![row("a", 1.5), row("b, with comma", 2.0)]);

        let only_b: Vec<Row> = table.read_where(|r: &Row| r.name.starts_with('b')).unwrap();
        assert_eq!(only_b.len(), 1);
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        fs::write(&path, "name,amount\na,1\nb,not-a-number\nc,3").unwrap();
        let table = CsvTable::new(&path, &["name", "amount"]);

        let rows: Vec<Row> = table.read_all().unwrap();
        assert_eq!(rows, vec![row("a", 1.0), row("c", 3.0)]);

        // 缺少结尾换行的文件追加后不会粘连
        table.append(&row("d", 4.0)).unwrap();
        let rows: Vec<Row> = table.read_all().unwrap();
        assert_eq!(rows.last(), Some(&row("d", 4.0)));
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_truncate_undoes_append() {
        let dir = tempfile::tempdir().unwrap();
        let table = CsvTable::new(dir.path().join("t.csv"), &["name", "amount"]);
        table.append(&row("a", 1.0)).unwrap();
        let before = table.append(&row("b", 2.0)).unwrap();
        table.truncate(before).unwrap();

        let rows: Vec<Row> = table.read_all().unwrap();
        assert_eq!(rows, vec![row("a", 1.0)]);
    }
}
