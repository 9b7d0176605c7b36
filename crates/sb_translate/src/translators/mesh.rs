use sb_core::native::{ArrayData, ElemType, Node, ParamArray, ParamValue};
use sb_core::usd::{types, Prim, Value};

use crate::context::{ReadContext, WriteContext};
use crate::convert;
use crate::translator::{TranslateError, TranslateResult, Translator};
use crate::translators::{read_motion_array, SHAPE_COMMON};

/// `Mesh` ↔ `polymesh`.
pub struct MeshTranslator;

const CONSUMED: &[&str] = &["primvars:st", "primvars:uv", "primvars:normals"];

const WRITTEN: &[&str] = &[
    "vlist",
    "nsides",
    "vidxlist",
    "nlist",
    "nidxlist",
    "uvlist",
    "uvidxlist",
    "subdiv_type",
];

impl Translator for MeshTranslator {
    fn schema(&self) -> &str {
        "Mesh"
    }

    fn native_types(&self) -> &[&'static str] {
        &["polymesh"]
    }

    fn node_type(&self, _prim: &Prim) -> Option<&'static str> {
        Some("polymesh")
    }

    fn read(&self, prim: &Prim, ctx: &mut ReadContext<'_>) -> TranslateResult<()> {
        let counts = uints(ctx.value(prim, "faceVertexCounts"));
        let mut indices = uints(ctx.value(prim, "faceVertexIndices"));
        let face_vertices: usize = counts.iter().map(|&c| c as usize).sum();
        if face_vertices != indices.len() {
            return Err(TranslateError::InvalidValue {
                name: "faceVertexIndices".to_string(),
                message: format!("{} indices for {} face vertices", indices.len(), face_vertices),
            });
        }
        let left_handed = ctx.token(prim, "orientation").as_deref() == Some("leftHanded");
        if left_handed {
            reverse_faces(&mut indices, &counts);
        }

        let Some(id) = ctx.create_node(prim.path(), "", "polymesh")? else {
            return Ok(());
        };
        ctx.read_shape_common(prim, id);
        read_motion_array(ctx, prim, id, "points", "vlist", ElemType::Vector);

        let topology = Topology {
            counts: &counts,
            vidx: &indices,
            left_handed,
        };

        let normals = ["primvars:normals", "normals"]
            .into_iter()
            .find(|name| prim.attribute(name).is_some_and(|a| a.has_value()));
        if let Some(name) = normals {
            let interpolation = prim
                .attribute(name)
                .and_then(|a| a.interpolation.clone())
                .unwrap_or_else(|| "vertex".to_string());
            let own_indices = ctx
                .value(prim, &format!("{}:indices", name))
                .map(|v| uints(Some(v)));
            read_motion_array(ctx, prim, id, name, "nlist", ElemType::Vector);
            let nidx = topology.face_vertex_indices(&interpolation, own_indices);
            ctx.set(id, "nidxlist", ParamValue::array(ArrayData::UInt(nidx)));
        }

        let uvs = ["primvars:st", "primvars:uv"]
            .into_iter()
            .find(|name| prim.attribute(name).is_some_and(|a| a.has_value()));
        if let Some(name) = uvs {
            let interpolation = prim
                .attribute(name)
                .and_then(|a| a.interpolation.clone())
                .unwrap_or_else(|| "faceVarying".to_string());
            let data = ctx
                .value(prim, name)
                .and_then(|v| convert::to_array_data(&v, ElemType::Vector2));
            match data {
                Some(data) => {
                    let own_indices = ctx
                        .value(prim, &format!("{}:indices", name))
                        .map(|v| uints(Some(v)));
                    let uvidx = topology.face_vertex_indices(&interpolation, own_indices);
                    ctx.set(id, "uvlist", ParamValue::array(data));
                    ctx.set(id, "uvidxlist", ParamValue::array(ArrayData::UInt(uvidx)));
                }
                None => ctx.warn(prim.path(), format!("cannot convert '{}'", name)),
            }
        }

        ctx.set(id, "nsides", ParamValue::array(ArrayData::UInt(counts.clone())));
        ctx.set(id, "vidxlist", ParamValue::array(ArrayData::UInt(indices.clone())));

        if let Some(scheme) = ctx.token(prim, "subdivisionScheme") {
            let subdiv = match scheme.as_str() {
                "catmullClark" | "loop" => Some("catclark"),
                "bilinear" => Some("linear"),
                "none" => Some("none"),
                _ => None,
            };
            match subdiv {
                Some(subdiv) => ctx.set(id, "subdiv_type", ParamValue::Enum(subdiv.to_string())),
                None => ctx.warn(prim.path(), format!("unknown subdivision scheme '{}'", scheme)),
            }
        }

        ctx.read_custom(prim, id, CONSUMED);
        Ok(())
    }

    fn write(&self, node: &Node, ctx: &mut WriteContext<'_>) -> TranslateResult<()> {
        ctx.write_shape_common(node);

        if let Some(vlist) = node.get_array("vlist") {
            ctx.set_motion_attr(node, "points", types::POINT3F_ARRAY, vec3_keys(vlist));
        }
        let counts = node.get_array("nsides").and_then(|a| a.uints()).unwrap_or(&[]);
        let vidx = node.get_array("vidxlist").and_then(|a| a.uints()).unwrap_or(&[]);
        ctx.set_attr("faceVertexCounts", types::INT_ARRAY, int_array(counts));
        ctx.set_attr("faceVertexIndices", types::INT_ARRAY, int_array(vidx));

        if let Some(nlist) = node.get_array("nlist").filter(|a| !a.data.is_empty()) {
            let nidx = node.get_array("nidxlist").and_then(|a| a.uints()).unwrap_or(&[]);
            let keys = vec3_keys(nlist);
            if nidx.is_empty() || nidx == vidx {
                ctx.set_motion_attr(node, "normals", types::NORMAL3F_ARRAY, keys);
                ctx.set_interpolation("normals", "vertex");
            } else {
                // Flatten indexed normals to one per face vertex.
                let keys = keys
                    .iter()
                    .filter_map(|k| k.as_vec3_array())
                    .map(|n| {
                        Value::Float3Array(
                            nidx.iter()
                                .map(|&i| n.get(i as usize).copied().unwrap_or_default())
                                .collect(),
                        )
                    })
                    .collect();
                ctx.set_motion_attr(node, "normals", types::NORMAL3F_ARRAY, keys);
                ctx.set_interpolation("normals", "faceVarying");
            }
        }

        if let Some(uvs) = node
            .get_array("uvlist")
            .and_then(|a| a.vec2s())
            .filter(|uvs| !uvs.is_empty())
        {
            let uvidx = node.get_array("uvidxlist").and_then(|a| a.uints()).unwrap_or(&[]);
            ctx.set_attr("primvars:st", types::TEXCOORD2F_ARRAY, Value::Float2Array(uvs.to_vec()));
            if uvidx.is_empty() || uvidx == vidx {
                ctx.set_interpolation("primvars:st", "vertex");
            } else {
                ctx.set_interpolation("primvars:st", "faceVarying");
                ctx.set_attr("primvars:st:indices", types::INT_ARRAY, int_array(uvidx));
            }
        }

        let scheme = match node.get_str("subdiv_type") {
            "catclark" => "catmullClark",
            "linear" => "bilinear",
            _ => "none",
        };
        ctx.set_uniform_attr("subdivisionScheme", types::TOKEN, Value::token(scheme));

        let skip: Vec<&str> = SHAPE_COMMON.iter().chain(WRITTEN).copied().collect();
        ctx.write_arnold_params(node, &skip);
        Ok(())
    }
}

/// Face layout used to expand primvar indices to one per face vertex.
struct Topology<'a> {
    counts: &'a [u32],
    /// Vertex indices, already reversed for left-handed meshes.
    vidx: &'a [u32],
    left_handed: bool,
}

impl Topology<'_> {
    fn face_vertex_indices(&self, interpolation: &str, own: Option<Vec<u32>>) -> Vec<u32> {
        let lookup = |i: u32| match &own {
            Some(own) => own.get(i as usize).copied().unwrap_or(0),
            None => i,
        };
        match interpolation {
            "vertex" | "varying" => self.vidx.iter().map(|&v| lookup(v)).collect(),
            "uniform" => self
                .counts
                .iter()
                .enumerate()
                .flat_map(|(face, &n)| std::iter::repeat(face as u32).take(n as usize))
                .map(lookup)
                .collect(),
            "constant" => vec![lookup(0); self.vidx.len()],
            _ => {
                let mut indices = own.unwrap_or_else(|| (0..self.vidx.len() as u32).collect());
                if self.left_handed {
                    reverse_faces(&mut indices, self.counts);
                }
                indices
            }
        }
    }
}

/// Reverse the vertex order of every face in place.
fn reverse_faces(indices: &mut [u32], counts: &[u32]) {
    let mut offset = 0;
    for &count in counts {
        let end = offset + count as usize;
        if end > indices.len() {
            break;
        }
        indices[offset..end].reverse();
        offset = end;
    }
}

fn uints(value: Option<Value>) -> Vec<u32> {
    value
        .and_then(|v| v.to_ints())
        .unwrap_or_default()
        .into_iter()
        .map(|i| i.max(0) as u32)
        .collect()
}

fn int_array(values: &[u32]) -> Value {
    Value::IntArray(values.iter().map(|&v| v as i32).collect())
}

pub(crate) fn vec3_keys(array: &ParamArray) -> Vec<Value> {
    (0..array.keys)
        .filter_map(|k| array.vec3s_at_key(k))
        .map(|v| Value::Float3Array(v.to_vec()))
        .collect()
}
