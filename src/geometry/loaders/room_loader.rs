/// 房间文本网格加载器
///
/// 文件格式：
///
/// ```text
/// 2076
/// -3000.0 0.0 -3000.0 0.0 0.0
/// ...
/// ```
///
/// 首行是三角形数量 N，随后 3N 行，每行一个顶点的位置和纹理坐标。
/// 顶点按三角形列表排列，不使用索引。
use super::MeshLoader;
use crate::core::error::{AssetError, Result};
use crate::geometry::mesh::{MeshData, PrimitiveTopology};
use crate::geometry::vertex::TexturedVertex;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 房间网格加载器
pub struct RoomLoader;

impl RoomLoader {
    fn parse(source: &str, path: &Path) -> Result<MeshData> {
        let parse_error = |line: usize, reason: String| AssetError::ParseError {
            path: path.to_path_buf(),
            line,
            reason,
        };

        let mut lines = source.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());

        let (header_line, header) = lines
            .next()
            .ok_or_else(|| parse_error(1, "missing triangle count".to_string()))?;
        let triangle_count: usize = header
            .trim()
            .parse()
            .map_err(|e| parse_error(header_line + 1, format!("invalid triangle count: {}", e)))?;
        if triangle_count == 0 {
            return Err(parse_error(header_line + 1, "triangle count is zero".to_string()).into());
        }

        let vertex_count = triangle_count
            .checked_mul(3)
            .filter(|&count| count <= u32::MAX as usize)
            .ok_or_else(|| parse_error(header_line + 1, "triangle count too large".to_string()))?;

        // 容量以文件中实际存在的顶点行数为上限
        let available = source.lines().skip(header_line + 1).filter(|l| !l.trim().is_empty()).count();
        if vertex_count > available {
            return Err(parse_error(
                source.lines().count() + 1,
                format!("expected {} vertices, found {}", vertex_count, available),
            )
            .into());
        }

        let mut vertices = Vec::with_capacity(vertex_count);
        for _ in 0..vertex_count {
            let (line_no, line) = lines.next().ok_or_else(|| {
                parse_error(
                    source.lines().count() + 1,
                    format!("expected {} vertices, found {}", vertex_count, vertices.len()),
                )
            })?;

            let values: Vec<f32> = line
                .split_whitespace()
                .map(|v| v.parse::<f32>())
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| parse_error(line_no + 1, e.to_string()))?;

            if values.len() != 5 {
                return Err(parse_error(
                    line_no + 1,
                    format!("expected 5 values (x y z u v), found {}", values.len()),
                )
                .into());
            }

            vertices.push(TexturedVertex {
                position: [values[0], values[1], values[2]],
                texcoord: [values[3], values[4]],
            });
        }

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("room")
            .to_string();

        debug!(triangles = triangle_count, "Parsed room mesh '{}'", name);
        Ok(MeshData::new(name, &vertices, None, PrimitiveTopology::TriangleList))
    }
}

impl MeshLoader for RoomLoader {
    fn load_from_file(path: &Path) -> Result<MeshData> {
        if !path.exists() {
            return Err(AssetError::FileNotFound(path.to_path_buf()).into());
        }

        let source = std::fs::read_to_string(path)?;
        Self::parse(&source, path)
    }

    fn load_from_memory(data: &[u8]) -> Result<MeshData> {
        let source = String::from_utf8_lossy(data);
        Self::parse(&source, &PathBuf::from("<memory>"))
    }

    fn supported_extensions() -> &'static [&'static str] {
        &["txt"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::RenderError;
    use std::io::Write;

    const TWO_TRIANGLES: &str = "2\n\
        0 0 0 0 0\n\
        1 0 0 1 0\n\
        0 1 0 0 1\n\
        1 0 0 1 0\n\
        1 1 0 1 1\n\
        0 1 0 0 1\n";

    #[test]
    fn test_load_from_memory() {
        let mesh = RoomLoader::load_from_memory(TWO_TRIANGLES.as_bytes()).unwrap();
        assert_eq!(mesh.vertex_count, 6);
        assert_eq!(mesh.triangle_count(), 2);
        assert!(!mesh.is_indexed());
        assert!(mesh.validate().is_ok());

        let fifth: TexturedVertex = bytemuck::pod_read_unaligned(&mesh.vertex_bytes[80..100]);
        assert_eq!(fifth.position, [1.0, 1.0, 0.0]);
        assert_eq!(fifth.texcoord, [1.0, 1.0]);
    }

    #[test]
    fn test_truncated_file_is_an_error() {
        let truncated = "2\n0 0 0 0 0\n1 0 0 1 0\n";
        let err = RoomLoader::load_from_memory(truncated.as_bytes()).unwrap_err();
        assert!(matches!(err, RenderError::Asset(AssetError::ParseError { .. })));
    }

    #[test]
    fn test_overflowing_triangle_count_is_an_error() {
        let header = format!("{}\n0 0 0 0 0\n", usize::MAX / 2);
        match RoomLoader::load_from_memory(header.as_bytes()).unwrap_err() {
            RenderError::Asset(AssetError::ParseError { line, .. }) => assert_eq!(line, 1),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_oversized_triangle_count_does_not_allocate() {
        // 3 * 1431655765 fits in u32 but the file holds a single vertex
        let err = RoomLoader::load_from_memory(b"1431655765\n0 0 0 0 0\n").unwrap_err();
        assert!(matches!(err, RenderError::Asset(AssetError::ParseError { .. })));
    }

    #[test]
    fn test_bad_number_reports_line() {
        let bad = "1\n0 0 0 0 0\n1 x 0 1 0\n0 1 0 0 1\n";
        match RoomLoader::load_from_memory(bad.as_bytes()).unwrap_err() {
            RenderError::Asset(AssetError::ParseError { line, .. }) => assert_eq!(line, 3),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        let err = RoomLoader::load_from_file(Path::new("no/such/room.txt")).unwrap_err();
        assert!(matches!(err, RenderError::Asset(AssetError::FileNotFound(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TWO_TRIANGLES.as_bytes()).unwrap();
        let mesh = RoomLoader::load_from_file(file.path()).unwrap();
        assert_eq!(mesh.vertex_count, 6);
    }
}
