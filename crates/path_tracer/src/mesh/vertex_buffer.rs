//! Packed vertex buffer.
//!
//! All streams live in one cache-line-aligned allocation with per-stream
//! byte offsets. Each stream carries a format tag chosen at build time: the
//! index stream narrows to 8 or 16 bits when the vertex count allows it,
//! attribute streams store full or half floats.

use glam::{Vec2, Vec3A};
use half::f16;
use tracing::error;

use crate::error::{RtError, RtResult};
use crate::material::MaterialId;
use crate::utils::aligned::AlignedBuffer;

/// Storage format of one vertex stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VertexDataFormat {
  None,
  Float,
  Half,
  Int32,
  Int16,
  Int8,
}

impl VertexDataFormat {
  fn byte_size(&self) -> usize {
    match self {
      VertexDataFormat::None => 0,
      VertexDataFormat::Float | VertexDataFormat::Int32 => 4,
      VertexDataFormat::Half | VertexDataFormat::Int16 => 2,
      VertexDataFormat::Int8 => 1,
    }
  }
}

/// External mesh data handed over by a loader.
///
/// `vertex_indices` holds three entries per triangle; attribute slices hold
/// three (`positions`, `normals`, `tangents`) or two (`tex_coords`) floats
/// per vertex. `material_indices` maps each triangle into `materials`.
pub struct VertexBufferDesc<'a> {
  pub num_vertices: u32,
  pub num_triangles: u32,
  pub vertex_indices: &'a [u32],
  pub positions: &'a [f32],
  pub normals: Option<&'a [f32]>,
  pub tangents: Option<&'a [f32]>,
  pub tex_coords: Option<&'a [f32]>,
  pub material_indices: Option<&'a [u32]>,
  pub materials: Vec<MaterialId>,
}

impl<'a> VertexBufferDesc<'a> {
  pub(crate) fn validate(&self) -> RtResult<()> {
    let fail = |reason: &str| {
      error!(reason, "invalid mesh descriptor");
      Err(RtError::InvalidMesh(reason.into()))
    };

    if self.num_triangles == 0 || self.num_vertices == 0 {
      return fail("empty mesh");
    }
    if self.vertex_indices.len() != self.num_triangles as usize * 3 {
      return fail("index stream length mismatch");
    }
    if self.positions.len() != self.num_vertices as usize * 3 {
      return fail("position stream length mismatch");
    }
    if self.vertex_indices.iter().any(|&i| i >= self.num_vertices) {
      return fail("vertex index out of range");
    }
    for (stream, per_vertex) in [
      (self.normals, 3usize),
      (self.tangents, 3),
      (self.tex_coords, 2),
    ] {
      if let Some(s) = stream {
        if s.len() != self.num_vertices as usize * per_vertex {
          return fail("attribute stream length mismatch");
        }
      }
    }
    if let Some(mats) = self.material_indices {
      if mats.len() != self.num_triangles as usize {
        return fail("material index stream length mismatch");
      }
      if mats.iter().any(|&m| m as usize >= self.materials.len()) {
        return fail("material index out of range");
      }
    }
    Ok(())
  }
}

// stream layout computed once at build
#[derive(Clone, Copy, Debug, Default)]
struct StreamLayout {
  offset: usize,
  size: usize,
}

/// Packed, immutable vertex data of one mesh. Per-triangle streams are
/// stored in BVH leaf order.
pub struct VertexBuffer {
  data: AlignedBuffer,
  num_vertices: u32,
  num_triangles: u32,

  index_format: VertexDataFormat,
  attribute_format: VertexDataFormat,

  indices: StreamLayout,
  positions: StreamLayout,
  normals: StreamLayout,
  tangents: StreamLayout,
  tex_coords: StreamLayout,
  material_indices: StreamLayout,

  materials: Vec<MaterialId>,
}

impl VertexBuffer {
  /// Pack the descriptor, permuting the per-triangle streams by
  /// `triangle_order` (BVH leaf order) and scaling positions by `scale`.
  pub fn new(desc: &VertexBufferDesc, triangle_order: &[u32], scale: f32) -> RtResult<Self> {
    desc.validate()?;
    debug_assert_eq!(triangle_order.len(), desc.num_triangles as usize);

    // narrow the index stream when the vertex count allows
    let index_format = if desc.num_vertices <= i8::MAX as u32 + 1 {
      VertexDataFormat::Int8
    } else if desc.num_vertices <= i16::MAX as u32 + 1 {
      VertexDataFormat::Int16
    } else {
      VertexDataFormat::Int32
    };
    let attribute_format = VertexDataFormat::Float;

    let nv = desc.num_vertices as usize;
    let nt = desc.num_triangles as usize;

    let mut cursor = 0usize;
    let mut layout = |size: usize| {
      // keep every stream 4-byte aligned
      let offset = (cursor + 3) & !3;
      cursor = offset + size;
      StreamLayout { offset, size }
    };

    let indices = layout(nt * 3 * index_format.byte_size());
    let positions = layout(nv * 3 * attribute_format.byte_size());
    let normals = layout(if desc.normals.is_some() {
      nv * 3 * attribute_format.byte_size()
    } else {
      0
    });
    let tangents = layout(if desc.tangents.is_some() {
      nv * 3 * attribute_format.byte_size()
    } else {
      0
    });
    let tex_coords = layout(if desc.tex_coords.is_some() {
      nv * 2 * attribute_format.byte_size()
    } else {
      0
    });
    let material_indices = layout(if desc.material_indices.is_some() {
      nt * 4
    } else {
      0
    });

    let mut data = AlignedBuffer::new(cursor)?;
    let bytes = data.as_mut_slice();

    // triangle streams, permuted into leaf order
    for (new_index, &old_index) in triangle_order.iter().enumerate() {
      for corner in 0..3 {
        let vertex = desc.vertex_indices[old_index as usize * 3 + corner];
        let slot = new_index * 3 + corner;
        match index_format {
          VertexDataFormat::Int8 => bytes[indices.offset + slot] = vertex as u8,
          VertexDataFormat::Int16 => {
            bytes[indices.offset + slot * 2..indices.offset + slot * 2 + 2]
              .copy_from_slice(&(vertex as u16).to_le_bytes());
          }
          _ => {
            bytes[indices.offset + slot * 4..indices.offset + slot * 4 + 4]
              .copy_from_slice(&vertex.to_le_bytes());
          }
        }
      }

      if let Some(mats) = desc.material_indices {
        let o = material_indices.offset + new_index * 4;
        bytes[o..o + 4].copy_from_slice(&mats[old_index as usize].to_le_bytes());
      }
    }

    // vertex streams, in original vertex order
    let write_floats = |bytes: &mut [u8], layout: &StreamLayout, values: &[f32], scale: f32| {
      for (i, v) in values.iter().enumerate() {
        let o = layout.offset + i * 4;
        bytes[o..o + 4].copy_from_slice(&(v * scale).to_le_bytes());
      }
    };
    write_floats(bytes, &positions, desc.positions, scale);
    if let Some(stream) = desc.normals {
      write_floats(bytes, &normals, stream, 1.0);
    }
    if let Some(stream) = desc.tangents {
      write_floats(bytes, &tangents, stream, 1.0);
    }
    if let Some(stream) = desc.tex_coords {
      write_floats(bytes, &tex_coords, stream, 1.0);
    }

    Ok(Self {
      data,
      num_vertices: desc.num_vertices,
      num_triangles: desc.num_triangles,
      index_format,
      attribute_format,
      indices,
      positions,
      normals,
      tangents,
      tex_coords,
      material_indices,
      materials: desc.materials.clone(),
    })
  }

  #[inline]
  pub fn num_triangles(&self) -> u32 {
    self.num_triangles
  }

  #[inline]
  pub fn num_vertices(&self) -> u32 {
    self.num_vertices
  }

  #[inline]
  pub fn index_format(&self) -> VertexDataFormat {
    self.index_format
  }

  #[inline]
  pub fn attribute_format(&self) -> VertexDataFormat {
    self.attribute_format
  }

  #[inline]
  pub fn has_normals(&self) -> bool {
    self.normals.size != 0
  }

  #[inline]
  pub fn has_tangents(&self) -> bool {
    self.tangents.size != 0
  }

  #[inline]
  pub fn has_tex_coords(&self) -> bool {
    self.tex_coords.size != 0
  }

  /// Vertex indices of one triangle.
  pub fn vertex_indices(&self, triangle: u32) -> [u32; 3] {
    debug_assert!(triangle < self.num_triangles);
    let bytes = self.data.as_slice();
    let slot = triangle as usize * 3;
    std::array::from_fn(|corner| match self.index_format {
      VertexDataFormat::Int8 => bytes[self.indices.offset + slot + corner] as u32,
      VertexDataFormat::Int16 => {
        let o = self.indices.offset + (slot + corner) * 2;
        u16::from_le_bytes(bytes[o..o + 2].try_into().unwrap()) as u32
      }
      _ => {
        let o = self.indices.offset + (slot + corner) * 4;
        u32::from_le_bytes(bytes[o..o + 4].try_into().unwrap())
      }
    })
  }

  fn read_vec3(&self, layout: &StreamLayout, vertex: u32) -> Vec3A {
    let bytes = self.data.as_slice();
    match self.attribute_format {
      VertexDataFormat::Half => {
        let o = layout.offset + vertex as usize * 6;
        let h = |i: usize| f16::from_le_bytes([bytes[o + i], bytes[o + i + 1]]).to_f32();
        Vec3A::new(h(0), h(2), h(4))
      }
      _ => {
        let o = layout.offset + vertex as usize * 12;
        let f = |i: usize| f32::from_le_bytes(bytes[o + i..o + i + 4].try_into().unwrap());
        Vec3A::new(f(0), f(4), f(8))
      }
    }
  }

  pub fn positions(&self, indices: [u32; 3]) -> [Vec3A; 3] {
    indices.map(|i| self.read_vec3(&self.positions, i))
  }

  pub fn normals(&self, indices: [u32; 3]) -> Option<[Vec3A; 3]> {
    self
      .has_normals()
      .then(|| indices.map(|i| self.read_vec3(&self.normals, i)))
  }

  pub fn tangents(&self, indices: [u32; 3]) -> Option<[Vec3A; 3]> {
    self
      .has_tangents()
      .then(|| indices.map(|i| self.read_vec3(&self.tangents, i)))
  }

  pub fn tex_coords(&self, indices: [u32; 3]) -> Option<[Vec2; 3]> {
    self.has_tex_coords().then(|| {
      indices.map(|i| {
        let bytes = self.data.as_slice();
        let o = self.tex_coords.offset + i as usize * 8;
        let f = |i: usize| f32::from_le_bytes(bytes[o + i..o + i + 4].try_into().unwrap());
        Vec2::new(f(0), f(4))
      })
    })
  }

  /// Material of one triangle, already resolved through the local table.
  pub fn material(&self, triangle: u32) -> MaterialId {
    if self.material_indices.size == 0 {
      return crate::material::DEFAULT_MATERIAL;
    }
    let bytes = self.data.as_slice();
    let o = self.material_indices.offset + triangle as usize * 4;
    let local = u32::from_le_bytes(bytes[o..o + 4].try_into().unwrap());
    self.materials[local as usize]
  }
}

#[cfg(test)]
#[path = "vertex_buffer_test.rs"]
mod vertex_buffer_test;
