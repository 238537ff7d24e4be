use isocore::algorithm::correction::{full_correction_matrix, CorrectionMethod};
use isocore::algorithm::labeling::{apply_unlabelled, LabelingSolver};
use isocore::chemistry::composition::ElementalComposition;
use isocore::error::CorrectionError;

// Reference run: a TBDMS-derivatized fragment with three tracer carbons.
fn main() -> Result<(), CorrectionError> {
    let composition: ElementalComposition = "C8 O2 N1 H26 Si2".parse()?;
    let channels = 4;

    let matrix = full_correction_matrix(&composition, channels, CorrectionMethod::Convolution)?;
    println!("correction matrix:{}", matrix);

    // m0..m3 as measured
    let measured = [0.6228, 0.1517, 0.0749, 0.1507];
    let solver = LabelingSolver::new(matrix)?;
    let mdva = solver.correct(&measured);

    // unlabelled biomass
    let mdvun = [0.9682, 0.0314, 0.0003, 0.0];
    let f_unlabelled = 0.01;
    let mdvaa = apply_unlabelled(&mdva, &mdvun, f_unlabelled)?;

    println!("mdva: {:?}", mdva.mdv);
    println!("mdvaa: {:?}", mdvaa.mdv);
    println!("Labelling: {:.2}", mdvaa.fractional_labeling);
    println!("Labelling uncorrected: {:.2}", mdva.fractional_labeling);

    Ok(())
}
