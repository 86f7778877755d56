fn main() {
    pcd_label_centers::cli::run();
}
