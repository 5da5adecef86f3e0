/// Skip a test if AWS credentials are not configured.
#[macro_export]
macro_rules! skip_without_aws {
    () => {
        if std::env::var("AWS_ACCESS_KEY_ID").is_err() {
            eprintln!("SKIPPED: AWS_ACCESS_KEY_ID not set");
            return;
        }
        if std::env::var("S3SEAL_TEST_KMS_KEY").is_err() {
            eprintln!("SKIPPED: S3SEAL_TEST_KMS_KEY not set (set to an AWS KMS key ARN)");
            return;
        }
    };
}
