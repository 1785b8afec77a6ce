use approx::assert_abs_diff_eq;
use lentil::model::LinearPredictor;
use nalgebra::DVector;

fn toy_predictor() -> LinearPredictor {
    LinearPredictor {
        intercept: 3.28,
        service_coef: 0.1,
        student_effect: DVector::from_vec(vec![0.05, -0.11]),
        instructor_effect: DVector::from_vec(vec![-0.02, 0.3, 0.07]),
        department_effect: DVector::from_vec(vec![0.03]),
    }
}

#[test]
fn worked_example() -> anyhow::Result<()> {
    let predictor = toy_predictor();

    // 3.28 + 0.1 * 1 + 0.05 - 0.02 + 0.03
    let y = predictor.predict_one(0, 0, 0, 1.0)?;
    assert_abs_diff_eq!(y, 3.44, epsilon = 1e-6);

    Ok(())
}

#[test]
fn affine_in_service_flag() -> anyhow::Result<()> {
    let predictor = toy_predictor();

    for s in 0..2 {
        for i in 0..3 {
            let y0 = predictor.predict_one(s, i, 0, 0.0)?;
            let y1 = predictor.predict_one(s, i, 0, 1.0)?;
            assert_abs_diff_eq!(y1 - y0, predictor.service_coef, epsilon = 1e-6);
        }
    }

    Ok(())
}

#[test]
fn superposition_of_grouping_terms() -> anyhow::Result<()> {
    let full = toy_predictor();

    let mut no_student = full.clone();
    no_student.student_effect = DVector::zeros(no_student.student_effect.len());

    let y_full = full.predict_one(1, 2, 0, 1.0)?;
    let y_reduced = no_student.predict_one(1, 2, 0, 1.0)?;

    assert_abs_diff_eq!(y_full - y_reduced, full.student_effect[1], epsilon = 1e-6);

    Ok(())
}

#[test]
fn point_estimate_prediction_is_deterministic() -> anyhow::Result<()> {
    let predictor = toy_predictor();

    let y1 = predictor.predict_one(1, 1, 0, 1.0)?;
    let y2 = predictor.predict_one(1, 1, 0, 1.0)?;

    assert_eq!(y1.to_bits(), y2.to_bits());

    Ok(())
}

#[test]
fn out_of_range_ids_fail() {
    let predictor = toy_predictor();

    assert!(predictor.predict_one(2, 0, 0, 0.0).is_err());
    assert!(predictor.predict_one(0, 3, 0, 0.0).is_err());
    assert!(predictor.predict_one(0, 0, 1, 0.0).is_err());

    let err = predictor.predict_one(9, 0, 0, 0.0).unwrap_err();
    assert!(err.to_string().contains("invalid student index"));
}
