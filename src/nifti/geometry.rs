//! Voxel-to-world geometry: qform quaternions, sform rows and orientation codes.
//!
//! Follows the conversions of the reference `nifti1_io.c` library:
//! `quatern_to_mat44` and `mat44_to_orientation`.

/// 3x3 matrix, row-major.
pub type Mat33 = [[f64; 3]; 3];

/// 4x4 affine matrix, row-major. Row 3 is always `[0, 0, 0, 1]`.
pub type Mat44 = [[f64; 4]; 4];

/// The identity affine.
pub const IDENTITY: Mat44 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Radicand of `a` below which the quaternion is treated as a 180° rotation.
const QUATERN_EPSILON: f64 = 1.0e-7;

/// Dot products above this are considered non-orthogonal.
const ORTHO_TOLERANCE: f64 = 1.0e-4;

/// Quaternion parameter `a` implied by `(b, c, d)`.
///
/// Returns 0 when `b² + c² + d²` is (numerically) at or above 1.
pub fn quatern_a(b: f64, c: f64, d: f64) -> f64 {
    let radicand = 1.0 - (b * b + c * c + d * d);
    if radicand < QUATERN_EPSILON {
        0.0
    } else {
        radicand.sqrt()
    }
}

/// Build the qform affine from quaternion `(b, c, d)`, offsets and `pixdim`.
///
/// `pixdim[1..=3]` are the voxel sizes (non-positive values are replaced by
/// 1) and `pixdim[0]` is `qfac`: a negative value flips the third axis.
#[allow(clippy::many_single_char_names)]
pub fn quaternion_to_affine(quatern: [f64; 3], qoffset: [f64; 3], pixdim: &[f64; 8]) -> Mat44 {
    let [mut b, mut c, mut d] = quatern;

    let mut a = 1.0 - (b * b + c * c + d * d);
    if a < QUATERN_EPSILON {
        // 180 degree rotation: renormalize (b, c, d)
        let inv = 1.0 / (b * b + c * c + d * d).sqrt();
        b *= inv;
        c *= inv;
        d *= inv;
        a = 0.0;
    } else {
        a = a.sqrt();
    }

    let positive = |v: f64| if v > 0.0 { v } else { 1.0 };
    let xd = positive(pixdim[1]);
    let yd = positive(pixdim[2]);
    let mut zd = positive(pixdim[3]);

    let qfac = if pixdim[0] == 0.0 { 1.0 } else { pixdim[0] };
    if qfac < 0.0 {
        zd = -zd;
    }

    [
        [
            (a * a + b * b - c * c - d * d) * xd,
            2.0 * (b * c - a * d) * yd,
            2.0 * (b * d + a * c) * zd,
            qoffset[0],
        ],
        [
            2.0 * (b * c + a * d) * xd,
            (a * a + c * c - b * b - d * d) * yd,
            2.0 * (c * d - a * b) * zd,
            qoffset[1],
        ],
        [
            2.0 * (b * d - a * c) * xd,
            2.0 * (c * d + a * b) * yd,
            (a * a + d * d - c * c - b * b) * zd,
            qoffset[2],
        ],
        [0.0, 0.0, 0.0, 1.0],
    ]
}

/// Build the sform affine from its three stored rows.
pub fn sform_to_affine(srow: &[[f64; 4]; 3]) -> Mat44 {
    [srow[0], srow[1], srow[2], [0.0, 0.0, 0.0, 1.0]]
}

/// Upper-left 3x3 block of an affine.
pub fn rotation_part(affine: &Mat44) -> Mat33 {
    let mut r = [[0.0; 3]; 3];
    for (row, src) in r.iter_mut().zip(affine) {
        row.copy_from_slice(&src[..3]);
    }
    r
}

/// Matrix product `a · b`.
pub fn mat33_mul(a: &Mat33, b: &Mat33) -> Mat33 {
    let mut c = [[0.0; 3]; 3];
    for (i, row) in c.iter_mut().enumerate() {
        for (j, v) in row.iter_mut().enumerate() {
            *v = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
        }
    }
    c
}

/// Determinant of a 3x3 matrix.
pub fn mat33_determinant(r: &Mat33) -> f64 {
    r[0][0] * r[1][1] * r[2][2] - r[0][0] * r[2][1] * r[1][2] - r[1][0] * r[0][1] * r[2][2]
        + r[1][0] * r[2][1] * r[0][2]
        + r[2][0] * r[0][1] * r[1][2]
        - r[2][0] * r[1][1] * r[0][2]
}

type Vec3 = [f64; 3];

fn dot(u: Vec3, v: Vec3) -> f64 {
    u[0] * v[0] + u[1] * v[1] + u[2] * v[2]
}

fn norm(v: Vec3) -> f64 {
    dot(v, v).sqrt()
}

fn cross(u: Vec3, v: Vec3) -> Vec3 {
    [
        u[1] * v[2] - u[2] * v[1],
        u[2] * v[0] - u[0] * v[2],
        u[0] * v[1] - u[1] * v[0],
    ]
}

fn normalized(v: Vec3) -> Option<Vec3> {
    let len = norm(v);
    if len == 0.0 {
        return None;
    }
    Some([v[0] / len, v[1] / len, v[2] / len])
}

/// Remove the component of `v` along unit vector `along`, if it is not
/// already (nearly) orthogonal.
fn orthogonalized(v: Vec3, along: Vec3) -> Option<Vec3> {
    let d = dot(v, along);
    if d.abs() > ORTHO_TOLERANCE {
        normalized([v[0] - d * along[0], v[1] - d * along[1], v[2] - d * along[2]])
    } else {
        Some(v)
    }
}

fn axis_code(column: usize, sign: f64) -> (char, char) {
    let letter = match column {
        0 => 'X',
        1 => 'Y',
        _ => 'Z',
    };
    (letter, if sign > 0.0 { '+' } else { '-' })
}

/// Orientation code of the voxel axes, e.g. `"XYZ+++"`.
///
/// The three letters name the world axis each voxel axis (i, j, k) runs
/// along most closely and the three signs its direction. Returns `None` when
/// an axis has zero length or two axes are parallel.
pub fn orientation_code(r: &Mat33) -> Option<String> {
    let column = |j: usize| [r[0][j], r[1][j], r[2][j]];

    let i_axis = normalized(column(0))?;
    let j_axis = orthogonalized(normalized(column(1))?, i_axis)?;

    let k_raw = column(2);
    let k_axis = if norm(k_raw) == 0.0 {
        cross(i_axis, j_axis)
    } else {
        normalized(k_raw)?
    };
    let k_axis = orthogonalized(k_axis, i_axis)?;
    let k_axis = orthogonalized(k_axis, j_axis)?;

    let q: Mat33 = [
        [i_axis[0], j_axis[0], k_axis[0]],
        [i_axis[1], j_axis[1], k_axis[1]],
        [i_axis[2], j_axis[2], k_axis[2]],
    ];
    let det_q = mat33_determinant(&q);
    if det_q == 0.0 {
        return None;
    }

    // Search every signed permutation P with the same handedness as Q for the
    // largest trace(P·Q), i.e. the smallest residual rotation.
    let mut best_trace = f64::NEG_INFINITY;
    let mut best = ([0usize, 1, 2], [1.0f64, 1.0, 1.0]);
    for i in 0..3 {
        for j in (0..3).filter(|&j| j != i) {
            let k = 3 - i - j;
            for p in [-1.0, 1.0] {
                for q_sign in [-1.0, 1.0] {
                    for r_sign in [-1.0, 1.0] {
                        let mut perm = [[0.0; 3]; 3];
                        perm[0][i] = p;
                        perm[1][j] = q_sign;
                        perm[2][k] = r_sign;
                        if mat33_determinant(&perm) * det_q <= 0.0 {
                            continue;
                        }
                        let m = mat33_mul(&perm, &q);
                        let trace = m[0][0] + m[1][1] + m[2][2];
                        if trace > best_trace {
                            best_trace = trace;
                            best = ([i, j, k], [p, q_sign, r_sign]);
                        }
                    }
                }
            }
        }
    }

    let (columns, signs) = best;
    let mut letters = String::with_capacity(3);
    let mut senses = String::with_capacity(3);
    for (column, sign) in columns.into_iter().zip(signs) {
        let (letter, sense) = axis_code(column, sign);
        letters.push(letter);
        senses.push(sense);
    }
    letters.push_str(&senses);
    Some(letters)
}
