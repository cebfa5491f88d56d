//! OBJ-style mesh text parser
//!
//! Splits a model into one flat (non-indexed) geometry block per material
//! boundary. Only `v`, `vt`, `vn`, `f` and `usemtl` lines are interpreted;
//! everything else (comments, groups, smoothing) is ignored.
//!
//! Face lines read 3, 6 or 9 integers depending on which coordinate lists are
//! non-empty at the time the face is read, with slashes treated as
//! whitespace. Any zero or negative index fails the whole parse.

use thiserror::Error;

/// Mesh parse errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Input contained nothing but whitespace
    #[error("mesh text is empty")]
    EmptyInput,

    /// A face referenced index 0 or a negative (relative) index
    #[error("line {line}: face index {index} is not positive")]
    NonPositiveIndex {
        /// 1-based line number
        line: usize,
        /// The offending index as written
        index: i64,
    },

    /// A face referenced a coordinate past the end of its list
    #[error("{kind} index {index} out of range ({len} available)")]
    IndexOutOfRange {
        /// Which list (`position`, `texcoord`, `normal`)
        kind: &'static str,
        /// 0-based index
        index: usize,
        /// List length at flush time
        len: usize,
    },

    /// Missing or non-numeric fields
    #[error("line {line}: malformed {what}")]
    Malformed {
        /// 1-based line number
        line: usize,
        /// What was being read
        what: &'static str,
    },
}

/// Parser switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Keep the source positions and triangles on every submesh
    pub export_triangles: bool,
}

/// One triangle corner, 0-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Corner {
    /// Position index
    pub v: usize,
    /// Texcoord index, when the face carried one
    pub t: Option<usize>,
    /// Normal index, when the face carried one
    pub n: Option<usize>,
}

/// A triangle of three corners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triangle(pub [Corner; 3]);

impl Triangle {
    fn has_texcoords(&self) -> bool {
        self.0.iter().all(|c| c.t.is_some())
    }

    fn has_normals(&self) -> bool {
        self.0.iter().all(|c| c.n.is_some())
    }
}

/// Source data kept for export (see [`ParseOptions::export_triangles`])
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTriangles {
    /// Every position read up to the flush
    pub positions: Vec<[f32; 3]>,
    /// The submesh's triangles
    pub triangles: Vec<Triangle>,
}

/// Flattened geometry for one submesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmeshGeometry {
    /// Three positions per triangle
    pub positions: Vec<[f32; 3]>,
    /// Three texcoords per triangle, if every face carried them
    pub texcoords: Option<Vec<[f32; 2]>>,
    /// Three normals per triangle, if every face carried them
    pub normals: Option<Vec<[f32; 3]>>,
    /// Export copy
    pub source: Option<SourceTriangles>,
}

impl SubmeshGeometry {
    /// Number of vertices (3 × triangles)
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

/// Parser output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedMesh {
    /// Submeshes in emission order
    pub submeshes: Vec<SubmeshGeometry>,
    /// One name per submesh, or empty when the text had no `usemtl`
    pub material_names: Vec<String>,
}

impl ParsedMesh {
    /// Total vertex count over all submeshes
    pub fn vertex_count(&self) -> usize {
        self.submeshes.iter().map(SubmeshGeometry::vertex_count).sum()
    }
}

/// Parse mesh text with default options
pub fn parse(text: &str) -> Result<ParsedMesh, ParseError> {
    parse_with(text, ParseOptions::default())
}

/// Parse mesh text
pub fn parse_with(text: &str, options: ParseOptions) -> Result<ParsedMesh, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::EmptyInput);
    }

    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut texcoords: Vec<[f32; 2]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();
    let mut triangles: Vec<Triangle> = Vec::new();

    let mut blocks: Vec<(Option<String>, SubmeshGeometry)> = Vec::new();
    let mut current_name: Option<String> = None;
    let mut seen_boundary = false;

    for (line_idx, raw) in text.lines().enumerate() {
        let line_no = line_idx + 1;

        if let Some(rest) = raw.strip_prefix("v ") {
            let [x, y, z] = read_floats::<3>(rest, line_no, "position")?;
            positions.push([x, y, z]);
        } else if let Some(rest) = raw.strip_prefix("vt") {
            let [u, v] = read_floats::<2>(rest, line_no, "texcoord")?;
            texcoords.push([u, v]);
        } else if let Some(rest) = raw.strip_prefix("vn") {
            let [x, y, z] = read_floats::<3>(rest, line_no, "normal")?;
            normals.push([x, y, z]);
        } else if let Some(rest) = raw.strip_prefix("f ") {
            let triangle = read_face(rest, line_no, !texcoords.is_empty(), !normals.is_empty())?;
            triangles.push(triangle);
        } else if let Some(rest) = raw.strip_prefix("usemtl") {
            if !triangles.is_empty() {
                let geometry = flatten(&positions, &texcoords, &normals, &triangles, options)?;
                blocks.push((current_name.take(), geometry));
                triangles.clear();
            }
            current_name = Some(rest.trim().to_string());
            seen_boundary = true;
        }
    }

    let geometry = flatten(&positions, &texcoords, &normals, &triangles, options)?;
    blocks.push((current_name.take(), geometry));

    let material_names = if seen_boundary {
        blocks.iter().map(|(name, _)| name.clone().unwrap_or_default()).collect()
    } else {
        Vec::new()
    };
    let submeshes: Vec<_> = blocks.into_iter().map(|(_, geometry)| geometry).collect();

    log::debug!(
        "Parsed mesh: {} positions, {} submeshes, {} vertices",
        positions.len(),
        submeshes.len(),
        submeshes.iter().map(SubmeshGeometry::vertex_count).sum::<usize>()
    );

    Ok(ParsedMesh { submeshes, material_names })
}

fn read_floats<const N: usize>(
    rest: &str,
    line: usize,
    what: &'static str,
) -> Result<[f32; N], ParseError> {
    let mut values = [0.0; N];
    let mut tokens = rest.split_whitespace();
    for value in &mut values {
        *value = tokens
            .next()
            .and_then(|token| token.parse().ok())
            .ok_or(ParseError::Malformed { line, what })?;
    }
    Ok(values)
}

fn read_face(
    rest: &str,
    line: usize,
    with_texcoords: bool,
    with_normals: bool,
) -> Result<Triangle, ParseError> {
    let per_corner = 1 + usize::from(with_texcoords) + usize::from(with_normals);

    let mut tokens = rest
        .split(|c: char| c == '/' || c.is_whitespace())
        .filter(|token| !token.is_empty());

    let mut next_index = || -> Result<usize, ParseError> {
        let index: i64 = tokens
            .next()
            .and_then(|token| token.parse().ok())
            .ok_or(ParseError::Malformed { line, what: "face" })?;
        if index <= 0 {
            return Err(ParseError::NonPositiveIndex { line, index });
        }
        usize::try_from(index - 1).map_err(|_| ParseError::Malformed { line, what: "face" })
    };

    let mut corners = [Corner { v: 0, t: None, n: None }; 3];
    for corner in &mut corners {
        let mut fields = [0usize; 3];
        for field in fields.iter_mut().take(per_corner) {
            *field = next_index()?;
        }
        corner.v = fields[0];
        match (with_texcoords, with_normals) {
            (true, true) => {
                corner.t = Some(fields[1]);
                corner.n = Some(fields[2]);
            }
            (true, false) => corner.t = Some(fields[1]),
            (false, true) => corner.n = Some(fields[1]),
            (false, false) => {}
        }
    }

    Ok(Triangle(corners))
}

fn lookup<T: Copy>(list: &[T], index: usize, kind: &'static str) -> Result<T, ParseError> {
    list.get(index).copied().ok_or(ParseError::IndexOutOfRange {
        kind,
        index,
        len: list.len(),
    })
}

fn flatten(
    positions: &[[f32; 3]],
    texcoords: &[[f32; 2]],
    normals: &[[f32; 3]],
    triangles: &[Triangle],
    options: ParseOptions,
) -> Result<SubmeshGeometry, ParseError> {
    let vertex_count = triangles.len() * 3;
    let want_texcoords = !triangles.is_empty() && triangles.iter().all(Triangle::has_texcoords);
    let want_normals = !triangles.is_empty() && triangles.iter().all(Triangle::has_normals);

    let mut out_positions = Vec::with_capacity(vertex_count);
    let mut out_texcoords = want_texcoords.then(|| Vec::with_capacity(vertex_count));
    let mut out_normals = want_normals.then(|| Vec::with_capacity(vertex_count));

    for corner in triangles.iter().flat_map(|triangle| triangle.0.iter()) {
        out_positions.push(lookup(positions, corner.v, "position")?);
        if let (Some(out), Some(t)) = (out_texcoords.as_mut(), corner.t) {
            out.push(lookup(texcoords, t, "texcoord")?);
        }
        if let (Some(out), Some(n)) = (out_normals.as_mut(), corner.n) {
            out.push(lookup(normals, n, "normal")?);
        }
    }

    let source = options.export_triangles.then(|| SourceTriangles {
        positions: positions.to_vec(),
        triangles: triangles.to_vec(),
    });

    Ok(SubmeshGeometry {
        positions: out_positions,
        texcoords: out_texcoords,
        normals: out_normals,
        source,
    })
}
