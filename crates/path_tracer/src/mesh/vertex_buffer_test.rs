use super::*;

fn quad_desc() -> (Vec<u32>, Vec<f32>, Vec<f32>, Vec<f32>, Vec<u32>) {
  // two triangles forming a unit quad in the xy plane
  let indices = vec![0, 1, 2, 0, 2, 3];
  let positions = vec![
    0.0, 0.0, 0.0, //
    1.0, 0.0, 0.0, //
    1.0, 1.0, 0.0, //
    0.0, 1.0, 0.0,
  ];
  let normals = vec![
    0.0, 0.0, 1.0, //
    0.0, 0.0, 1.0, //
    0.0, 0.0, 1.0, //
    0.0, 0.0, 1.0,
  ];
  let tex_coords = vec![
    0.0, 0.0, //
    1.0, 0.0, //
    1.0, 1.0, //
    0.0, 1.0,
  ];
  let material_indices = vec![0, 1];
  (indices, positions, normals, tex_coords, material_indices)
}

#[test]
fn test_packing_roundtrip() {
  let (indices, positions, normals, tex_coords, material_indices) = quad_desc();
  let desc = VertexBufferDesc {
    num_vertices: 4,
    num_triangles: 2,
    vertex_indices: &indices,
    positions: &positions,
    normals: Some(&normals),
    tangents: None,
    tex_coords: Some(&tex_coords),
    material_indices: Some(&material_indices),
    materials: vec![10, 20],
  };

  let vb = VertexBuffer::new(&desc, &[0, 1], 1.0).unwrap();

  assert_eq!(vb.num_triangles(), 2);
  assert_eq!(vb.num_vertices(), 4);
  // 4 vertices narrow to the 8-bit index stream
  assert_eq!(vb.index_format(), VertexDataFormat::Int8);

  assert_eq!(vb.vertex_indices(0), [0, 1, 2]);
  assert_eq!(vb.vertex_indices(1), [0, 2, 3]);

  let [p0, p1, _] = vb.positions(vb.vertex_indices(0));
  assert_eq!(p0, glam::Vec3A::ZERO);
  assert_eq!(p1, glam::Vec3A::X);

  let normals = vb.normals(vb.vertex_indices(0)).unwrap();
  assert_eq!(normals[0], glam::Vec3A::Z);

  let uv = vb.tex_coords(vb.vertex_indices(1)).unwrap();
  assert_eq!(uv[2], glam::Vec2::new(0.0, 1.0));

  assert_eq!(vb.material(0), 10);
  assert_eq!(vb.material(1), 20);
}

#[test]
fn test_triangle_order_permutes_streams() {
  let (indices, positions, _, _, material_indices) = quad_desc();
  let desc = VertexBufferDesc {
    num_vertices: 4,
    num_triangles: 2,
    vertex_indices: &indices,
    positions: &positions,
    normals: None,
    tangents: None,
    tex_coords: None,
    material_indices: Some(&material_indices),
    materials: vec![10, 20],
  };

  // leaf order swaps the two triangles
  let vb = VertexBuffer::new(&desc, &[1, 0], 1.0).unwrap();
  assert_eq!(vb.vertex_indices(0), [0, 2, 3]);
  assert_eq!(vb.material(0), 20);
  assert_eq!(vb.material(1), 10);
}

#[test]
fn test_scale_applies_to_positions() {
  let (indices, positions, _, _, _) = quad_desc();
  let desc = VertexBufferDesc {
    num_vertices: 4,
    num_triangles: 2,
    vertex_indices: &indices,
    positions: &positions,
    normals: None,
    tangents: None,
    tex_coords: None,
    material_indices: None,
    materials: vec![],
  };
  let vb = VertexBuffer::new(&desc, &[0, 1], 2.0).unwrap();
  let [_, p1, _] = vb.positions(vb.vertex_indices(0));
  assert_eq!(p1, glam::Vec3A::new(2.0, 0.0, 0.0));
  assert_eq!(vb.material(0), crate::material::DEFAULT_MATERIAL);
}

#[test]
fn test_validation_rejects_malformed_descriptors() {
  let (indices, positions, _, _, _) = quad_desc();

  // out-of-range vertex index
  let bad_indices = vec![0, 1, 9, 0, 2, 3];
  let desc = VertexBufferDesc {
    num_vertices: 4,
    num_triangles: 2,
    vertex_indices: &bad_indices,
    positions: &positions,
    normals: None,
    tangents: None,
    tex_coords: None,
    material_indices: None,
    materials: vec![],
  };
  assert!(VertexBuffer::new(&desc, &[0, 1], 1.0).is_err());

  // empty mesh
  let desc = VertexBufferDesc {
    num_vertices: 0,
    num_triangles: 0,
    vertex_indices: &[],
    positions: &[],
    normals: None,
    tangents: None,
    tex_coords: None,
    material_indices: None,
    materials: vec![],
  };
  assert!(VertexBuffer::new(&desc, &[], 1.0).is_err());

  // index stream too short
  let desc = VertexBufferDesc {
    num_vertices: 4,
    num_triangles: 2,
    vertex_indices: &indices[..3],
    positions: &positions,
    normals: None,
    tangents: None,
    tex_coords: None,
    material_indices: None,
    materials: vec![],
  };
  assert!(VertexBuffer::new(&desc, &[0, 1], 1.0).is_err());
}
