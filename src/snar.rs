//! snar — формат блоба инкрементального состояния.
//!
//! Файл {interval}_{dirname}.snar:
//! Header (переменной длины):
//!   [magic8="TUSNAR01"][ver u32=1][level u8][pad3][date_len u32][date utf8][count u64]
//! Tail:
//!   count записей [path_len u32][path utf8][mtime_secs i64][size u64][mode u32],
//!   затем [crc32 u32] поверх всего после magic.
//!
//! date — дата запуска, записавшего блоб (формат RUN_DATE_FMT; пустая строка
//! для состояния, ещё не прошедшего через builder). Цепочечная запись
//! перезаписывается ровно раз за успешный билд своего яруса, поэтому её дата —
//! надёжный признак "этот ярус сегодня уже пробегал", переживающий удаление
//! датированных локальных артефактов.
//!
//! Записи отсортированы по пути (BTreeMap), сериализация детерминирована.
//! Блоб непрозрачен для остального кода: им владеют archive/state.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher as Crc32;

use crate::consts::{SNAR_MAGIC, SNAR_VER_1};

/// Метаданные одного обычного файла на момент записи состояния.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileMeta {
    pub mtime_secs: i64,
    pub size: u64,
    pub mode: u32,
}

/// Состояние снапшота: level архиватора, дата записавшего запуска
/// и карта путь → метаданные.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SnarState {
    pub level: u8,
    pub date: String,
    pub entries: BTreeMap<PathBuf, FileMeta>,
}

impl SnarState {
    pub fn new(level: u8) -> Self {
        Self {
            level,
            date: String::new(),
            entries: BTreeMap::new(),
        }
    }

    /// Файл изменился относительно этого состояния?
    /// Новый путь или расхождение по mtime/size → изменился.
    pub fn changed(&self, path: &Path, meta: &FileMeta) -> bool {
        match self.entries.get(path) {
            None => true,
            Some(prev) => prev.mtime_secs != meta.mtime_secs || prev.size != meta.size,
        }
    }

    /// Сериализация в байты (header + entries + crc32).
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut body: Vec<u8> = Vec::new();
        // часть заголовка после magic — тоже под crc
        body.write_u32::<LittleEndian>(SNAR_VER_1)?;
        body.write_u8(self.level)?;
        body.write_all(&[0u8; 3])?; // pad
        body.write_u32::<LittleEndian>(self.date.len() as u32)?;
        body.write_all(self.date.as_bytes())?;
        body.write_u64::<LittleEndian>(self.entries.len() as u64)?;

        for (path, meta) in &self.entries {
            let p = path
                .to_str()
                .ok_or_else(|| anyhow!("non-utf8 path in snar state: {}", path.display()))?;
            body.write_u32::<LittleEndian>(p.len() as u32)?;
            body.write_all(p.as_bytes())?;
            body.write_i64::<LittleEndian>(meta.mtime_secs)?;
            body.write_u64::<LittleEndian>(meta.size)?;
            body.write_u32::<LittleEndian>(meta.mode)?;
        }

        let mut h = Crc32::new();
        h.update(&body);
        let crc = h.finalize();

        let mut out = Vec::with_capacity(8 + body.len() + 4);
        out.write_all(SNAR_MAGIC)?;
        out.write_all(&body)?;
        out.write_u32::<LittleEndian>(crc)?;
        Ok(out)
    }

    /// Разбор блоба с проверкой magic, версии и crc.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        // магия + минимальный заголовок (пустая дата, ноль записей) + crc
        if buf.len() < 8 + 20 + 4 {
            return Err(anyhow!("snar blob too small ({} bytes)", buf.len()));
        }
        if &buf[..8] != SNAR_MAGIC {
            return Err(anyhow!("bad snar magic"));
        }
        let body = &buf[8..buf.len() - 4];
        let mut tail = Cursor::new(&buf[buf.len() - 4..]);
        let want_crc = tail.read_u32::<LittleEndian>()?;
        let mut h = Crc32::new();
        h.update(body);
        let got_crc = h.finalize();
        if got_crc != want_crc {
            return Err(anyhow!(
                "snar crc mismatch: stored=0x{:08x}, computed=0x{:08x}",
                want_crc,
                got_crc
            ));
        }

        let mut c = Cursor::new(body);
        let ver = c.read_u32::<LittleEndian>()?;
        if ver != SNAR_VER_1 {
            return Err(anyhow!("unsupported snar version {}", ver));
        }
        let level = c.read_u8()?;
        let mut pad = [0u8; 3];
        c.read_exact(&mut pad)?;
        let dlen = c.read_u32::<LittleEndian>()? as usize;
        let mut dbuf = vec![0u8; dlen];
        c.read_exact(&mut dbuf)
            .map_err(|_| anyhow!("snar truncated inside date"))?;
        let date = String::from_utf8(dbuf).map_err(|_| anyhow!("non-utf8 date in snar blob"))?;
        let count = c.read_u64::<LittleEndian>()?;

        let mut entries = BTreeMap::new();
        for _ in 0..count {
            let plen = c.read_u32::<LittleEndian>()? as usize;
            let mut pbuf = vec![0u8; plen];
            c.read_exact(&mut pbuf)
                .map_err(|_| anyhow!("snar truncated inside entry"))?;
            let path = PathBuf::from(
                String::from_utf8(pbuf).map_err(|_| anyhow!("non-utf8 path in snar blob"))?,
            );
            let mtime_secs = c.read_i64::<LittleEndian>()?;
            let size = c.read_u64::<LittleEndian>()?;
            let mode = c.read_u32::<LittleEndian>()?;
            entries.insert(
                path,
                FileMeta {
                    mtime_secs,
                    size,
                    mode,
                },
            );
        }
        if c.position() != body.len() as u64 {
            return Err(anyhow!("snar blob has trailing garbage"));
        }

        Ok(Self {
            level,
            date,
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SnarState {
        let mut st = SnarState::new(2);
        st.date = "2026-08-30".to_string();
        st.entries.insert(
            PathBuf::from("photos/2024/a.jpg"),
            FileMeta {
                mtime_secs: 1_700_000_000,
                size: 12345,
                mode: 0o644,
            },
        );
        st.entries.insert(
            PathBuf::from("notes.txt"),
            FileMeta {
                mtime_secs: 1_699_999_999,
                size: 7,
                mode: 0o600,
            },
        );
        st
    }

    #[test]
    fn roundtrip() -> anyhow::Result<()> {
        let st = sample();
        let bytes = st.to_bytes()?;
        let back = SnarState::from_bytes(&bytes)?;
        assert_eq!(back, st);
        Ok(())
    }

    #[test]
    fn roundtrip_without_date() -> anyhow::Result<()> {
        // состояние, ещё не прошедшее через builder: дата пустая
        let st = SnarState::new(0);
        let back = SnarState::from_bytes(&st.to_bytes()?)?;
        assert_eq!(back, st);
        assert!(back.date.is_empty());
        Ok(())
    }

    #[test]
    fn deterministic_serialization() -> anyhow::Result<()> {
        let a = sample().to_bytes()?;
        let b = sample().to_bytes()?;
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn corruption_rejected() -> anyhow::Result<()> {
        let mut bytes = sample().to_bytes()?;
        // бьём один байт в теле — crc обязан поймать
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;
        assert!(SnarState::from_bytes(&bytes).is_err());
        Ok(())
    }

    #[test]
    fn bad_magic_rejected() -> anyhow::Result<()> {
        let mut bytes = sample().to_bytes()?;
        bytes[0] = b'X';
        assert!(SnarState::from_bytes(&bytes).is_err());
        Ok(())
    }

    #[test]
    fn changed_semantics() {
        let st = sample();
        let known = PathBuf::from("notes.txt");
        let same = FileMeta {
            mtime_secs: 1_699_999_999,
            size: 7,
            mode: 0o600,
        };
        assert!(!st.changed(&known, &same));
        // mode не участвует в сравнении, mtime/size — участвуют
        let touched = FileMeta {
            mtime_secs: same.mtime_secs + 1,
            ..same
        };
        assert!(st.changed(&known, &touched));
        let grown = FileMeta {
            size: 8,
            ..same
        };
        assert!(st.changed(&known, &grown));
        assert!(st.changed(Path::new("new.txt"), &same));
    }
}
