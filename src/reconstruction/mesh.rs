// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Textured mesh buffers and Wavefront OBJ export
//!
//! Vertex colors use the common OBJ extension of appending `r g b` to each
//! `v` line, which the downstream viewers we target all accept.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Vertex/face/color buffers produced by mesh extraction.
///
/// The only artifact that outlives a request: it is written to a mesh file
/// and returned to the caller.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub vertices: Vec<[f32; 3]>,
    pub faces: Vec<[u32; 3]>,
    /// Per-vertex color in [0, 1], present when extraction ran with vertex
    /// color enabled.
    pub colors: Option<Vec<[f32; 3]>>,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn has_vertex_color(&self) -> bool {
        self.colors.is_some()
    }

    /// Write the mesh as Wavefront OBJ.
    pub fn write_obj(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "# Vertices: {}", self.vertex_count())?;
        writeln!(writer, "# Faces: {}", self.face_count())?;
        writeln!(writer)?;

        match &self.colors {
            Some(colors) => {
                for (v, c) in self.vertices.iter().zip(colors) {
                    writeln!(
                        writer,
                        "v {} {} {} {} {} {}",
                        v[0], v[1], v[2], c[0], c[1], c[2]
                    )?;
                }
            }
            None => {
                for v in &self.vertices {
                    writeln!(writer, "v {} {} {}", v[0], v[1], v[2])?;
                }
            }
        }

        writeln!(writer)?;

        // OBJ indices start at 1
        for f in &self.faces {
            writeln!(writer, "f {} {} {}", f[0] + 1, f[1] + 1, f[2] + 1)?;
        }

        writer.flush()?;
        Ok(())
    }
}
