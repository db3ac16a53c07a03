//! Type hint → parameter type lookup
//!
//! Chunks carry fine-grained type hints (a specific curve kind, an integer
//! width, ...). Parameters accepting structured data declare coarser
//! `s`-prefixed types. The table below is the complete mapping; hints that
//! are known but have no parameter counterpart map to `None`, as does any
//! hint not listed.

use crate::models::ParameterType;

/// Known type hints and the parameter type accepting them
pub const TYPE_HINT_TABLE: &[(&str, Option<&str>)] = &[
    // Primitives
    ("boolean", Some("sBool")),
    ("color", Some("sColor")),
    ("decimal", Some("sNumber")),
    ("double", Some("sNumber")),
    ("single", Some("sNumber")),
    ("int8", Some("sInteger")),
    ("int16", Some("sInteger")),
    ("int32", Some("sInteger")),
    ("int64", Some("sInteger")),
    ("uint8", Some("sInteger")),
    ("uint16", Some("sInteger")),
    ("uint32", Some("sInteger")),
    ("uint64", Some("sInteger")),
    ("char", Some("sString")),
    ("guid", Some("sString")),
    ("string", Some("sString")),
    ("image", None),
    // Geometry primitives
    ("geometry.arc", Some("sCurve")),
    ("geometry.boundingbox", Some("sBox")),
    ("geometry.box", Some("sBox")),
    ("geometry.circle", Some("sCircle")),
    ("geometry.complex", None),
    ("geometry.cone", None),
    ("geometry.cylinder", None),
    ("geometry.ellipse", Some("sCurve")),
    ("geometry.interval", Some("sDomain")),
    ("geometry.interval2", Some("sDomain2D")),
    ("geometry.line", Some("sLine")),
    ("geometry.matrix", None),
    ("geometry.plane", Some("sPlane")),
    ("geometry.point", Some("sPoint")),
    ("geometry.point2d", Some("sPoint")),
    ("geometry.point3d", Some("sPoint")),
    ("geometry.point4d", Some("sPoint")),
    ("geometry.polyline", Some("sCurve")),
    ("geometry.ray", None),
    ("geometry.rectangle", Some("sRectangle")),
    ("geometry.sphere", None),
    ("geometry.torus", None),
    ("geometry.transform", None),
    ("geometry.vector", Some("sVector")),
    ("geometry.vector2d", Some("sVector")),
    ("geometry.vector3d", Some("sVector")),
    // Rhino geometry
    ("rhino.arccurve", Some("sCurve")),
    ("rhino.brep", Some("sBrep")),
    ("rhino.curve", Some("sCurve")),
    ("rhino.extrusion", Some("sBrep")),
    ("rhino.linecurve", Some("sCurve")),
    ("rhino.mesh", Some("sMesh")),
    ("rhino.nurbscurve", Some("sCurve")),
    ("rhino.nurbssurface", Some("sSurface")),
    ("rhino.planesurface", Some("sSurface")),
    ("rhino.point", Some("sPoint")),
    ("rhino.pointcloud", None),
    ("rhino.polycurve", Some("sCurve")),
    ("rhino.polylinecurve", Some("sCurve")),
    ("rhino.revsurface", Some("sSurface")),
    ("rhino.subd", Some("sSubdiv")),
    ("rhino.sumsurface", Some("sSurface")),
    ("rhino.surface", Some("sSurface")),
];

/// Parameter type accepting data with the given type hint (case-insensitive)
pub fn parameter_type_for_hint(hint: &str) -> Option<ParameterType> {
    let hint = hint.trim().to_lowercase();
    TYPE_HINT_TABLE
        .iter()
        .find(|(name, _)| *name == hint)
        .and_then(|(_, param_type)| param_type.map(ParameterType::new))
}
